use std::sync::Arc;

use nalgebra::DMatrix;
use sk_core::{Error, Interval, Point, Result, check_dimension, check_probability};

use super::{UNIFORM_KURTOSIS, UNIFORM_MEAN, UNIFORM_VARIANCE, check_conditioning};
use crate::distribution::{Distribution, DistributionRef};
use crate::rng::RandomStream;

/// Independent (product) copula `C(u) = Π u_i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndependentCopula {
    dimension: usize,
}

impl IndependentCopula {
    /// Create the independent copula of the given dimension (`>= 1`).
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::InvalidParameter("copula dimension must be >= 1".into()));
        }
        Ok(Self { dimension })
    }
}

impl Distribution for IndependentCopula {
    fn name(&self) -> &'static str {
        "IndependentCopula"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn range(&self) -> Interval {
        Interval::unit(self.dimension)
    }

    fn parameters(&self) -> Vec<f64> {
        Vec::new()
    }

    fn parameter_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn pdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(self.dimension, x.len())?;
        Ok(if x.iter().all(|v| (0.0..=1.0).contains(v)) { 1.0 } else { 0.0 })
    }

    fn cdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(self.dimension, x.len())?;
        Ok(x.iter().map(|v| v.clamp(0.0, 1.0)).product())
    }

    fn survival(&self, x: &[f64]) -> Result<f64> {
        check_dimension(self.dimension, x.len())?;
        Ok(x.iter().map(|v| (1.0 - v).clamp(0.0, 1.0)).product())
    }

    fn complementary_cdf(&self, x: &[f64]) -> Result<f64> {
        Ok(1.0 - self.cdf(x)?)
    }

    fn realization(&self, rng: &mut RandomStream) -> Result<Point> {
        Ok((0..self.dimension).map(|_| rng.uniform()).collect())
    }

    fn mean(&self) -> Result<Point> {
        Ok(vec![UNIFORM_MEAN; self.dimension])
    }

    fn covariance(&self) -> Result<DMatrix<f64>> {
        Ok(DMatrix::identity(self.dimension, self.dimension) * UNIFORM_VARIANCE)
    }

    fn skewness(&self) -> Result<Point> {
        Ok(vec![0.0; self.dimension])
    }

    fn kurtosis(&self) -> Result<Point> {
        Ok(vec![UNIFORM_KURTOSIS; self.dimension])
    }

    fn entropy(&self) -> Result<f64> {
        Ok(0.0)
    }

    fn quantile(&self, p: f64, tail: bool) -> Result<Point> {
        check_probability(p)?;
        let level = if tail { 1.0 - p } else { p };
        Ok(vec![level.powf(1.0 / self.dimension as f64); self.dimension])
    }

    fn inverse_survival(&self, p: f64) -> Result<Point> {
        check_probability(p)?;
        Ok(vec![1.0 - p.powf(1.0 / self.dimension as f64); self.dimension])
    }

    fn marginal_distinct(&self, indices: &[usize]) -> Result<DistributionRef> {
        Ok(Arc::new(IndependentCopula::new(indices.len())?))
    }

    fn is_copula(&self) -> bool {
        true
    }

    fn has_elliptical_copula(&self) -> bool {
        true
    }

    fn has_independent_copula(&self) -> bool {
        true
    }

    fn conditional_pdf(&self, x: f64, y: &[f64]) -> Result<f64> {
        check_conditioning(self.dimension, y)?;
        Ok(if (0.0..=1.0).contains(&x) { 1.0 } else { 0.0 })
    }

    fn conditional_cdf(&self, x: f64, y: &[f64]) -> Result<f64> {
        check_conditioning(self.dimension, y)?;
        Ok(x.clamp(0.0, 1.0))
    }

    fn conditional_quantile(&self, q: f64, y: &[f64]) -> Result<f64> {
        check_conditioning(self.dimension, y)?;
        check_probability(q)?;
        Ok(q)
    }
}
