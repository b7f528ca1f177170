//! Continuous uniform distribution on `[a, b]`.

use std::sync::Arc;

use nalgebra::DMatrix;
use sk_core::{Error, Interval, Point, Result, check_dimension, check_probability};

use crate::distribution::{Distribution, DistributionRef, scalar_range};
use crate::rng::RandomStream;

/// Uniform law on `[a, b]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uniform {
    a: f64,
    b: f64,
}

impl Uniform {
    /// Create `U(a, b)`; requires finite `a < b`.
    pub fn new(a: f64, b: f64) -> Result<Self> {
        if !(a.is_finite() && b.is_finite()) || a >= b {
            return Err(Error::InvalidParameter(format!(
                "Uniform requires finite a < b, got a={a}, b={b}"
            )));
        }
        Ok(Self { a, b })
    }

    /// Lower bound.
    pub fn a(&self) -> f64 {
        self.a
    }

    /// Upper bound.
    pub fn b(&self) -> f64 {
        self.b
    }
}

impl Distribution for Uniform {
    fn name(&self) -> &'static str {
        "Uniform"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn range(&self) -> Interval {
        scalar_range(self.a, self.b)
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.a, self.b]
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["a".into(), "b".into()]
    }

    fn pdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(1, x.len())?;
        Ok(if (self.a..=self.b).contains(&x[0]) { 1.0 / (self.b - self.a) } else { 0.0 })
    }

    fn cdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(1, x.len())?;
        Ok(((x[0] - self.a) / (self.b - self.a)).clamp(0.0, 1.0))
    }

    fn complementary_cdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(1, x.len())?;
        Ok(((self.b - x[0]) / (self.b - self.a)).clamp(0.0, 1.0))
    }

    fn realization(&self, rng: &mut RandomStream) -> Result<Point> {
        Ok(vec![self.a + (self.b - self.a) * rng.uniform()])
    }

    fn mean(&self) -> Result<Point> {
        Ok(vec![0.5 * (self.a + self.b)])
    }

    fn covariance(&self) -> Result<DMatrix<f64>> {
        let w = self.b - self.a;
        Ok(DMatrix::from_element(1, 1, w * w / 12.0))
    }

    fn skewness(&self) -> Result<Point> {
        Ok(vec![0.0])
    }

    fn kurtosis(&self) -> Result<Point> {
        Ok(vec![1.8])
    }

    fn entropy(&self) -> Result<f64> {
        Ok((self.b - self.a).ln())
    }

    fn quantile(&self, p: f64, tail: bool) -> Result<Point> {
        check_probability(p)?;
        let level = if tail { 1.0 - p } else { p };
        Ok(vec![self.a + level * (self.b - self.a)])
    }

    fn inverse_survival(&self, p: f64) -> Result<Point> {
        check_probability(p)?;
        Ok(vec![self.b - p * (self.b - self.a)])
    }

    fn marginal_distinct(&self, _indices: &[usize]) -> Result<DistributionRef> {
        Ok(Arc::new(*self))
    }

    fn is_elliptical(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basic() {
        let u = Uniform::new(-1.0, 3.0).unwrap();
        assert_relative_eq!(u.pdf(&[0.0]).unwrap(), 0.25);
        assert_eq!(u.pdf(&[3.5]).unwrap(), 0.0);
        assert_relative_eq!(u.cdf(&[0.0]).unwrap(), 0.25);
        assert_relative_eq!(u.survival(&[0.0]).unwrap(), 0.75);
        assert_relative_eq!(u.quantile(0.25, true).unwrap()[0], 2.0);
        assert_relative_eq!(u.inverse_survival(0.25).unwrap()[0], 2.0);
        assert_relative_eq!(u.entropy().unwrap(), 4f64.ln());
        assert_relative_eq!(u.covariance().unwrap()[(0, 0)], 16.0 / 12.0);
    }

    #[test]
    fn test_invalid() {
        assert!(Uniform::new(1.0, 1.0).is_err());
        assert!(Uniform::new(0.0, f64::INFINITY).is_err());
    }
}
