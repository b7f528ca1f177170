//! Zipf-Mandelbrot law on `{1, ..., N}` with `P(k) ∝ (k + q)^-s`.

use std::sync::Arc;

use nalgebra::DMatrix;
use sk_core::{Error, Interval, Point, Result, check_dimension, check_probability};

use crate::distribution::{Distribution, DistributionRef, scalar_range};
use crate::math::log_sum_exp;
use crate::rng::RandomStream;

/// Distance under which a point is considered to sit on an integer support point.
const SUPPORT_EPSILON: f64 = 1e-12;

/// Discrete Zipf-Mandelbrot distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct ZipfMandelbrot {
    n: usize,
    q: f64,
    s: f64,
    /// `P(X = k)` for `k = 1..=n`.
    pmf: Vec<f64>,
    /// `P(X <= k)` for `k = 1..=n`.
    cumulative: Vec<f64>,
    /// `P(X > k)` for `k = 1..=n`, summed from the top for tail accuracy.
    tail: Vec<f64>,
}

impl ZipfMandelbrot {
    /// Create `ZipfMandelbrot(n, q, s)`; requires `n >= 1`, `q >= 0`, `s > 0`.
    pub fn new(n: usize, q: f64, s: f64) -> Result<Self> {
        if n == 0 {
            return Err(Error::InvalidParameter("N must be >= 1".into()));
        }
        if !(q.is_finite() && q >= 0.0) {
            return Err(Error::InvalidParameter(format!("q must be finite and >= 0, got {q}")));
        }
        if !(s.is_finite() && s > 0.0) {
            return Err(Error::InvalidParameter(format!("s must be finite and > 0, got {s}")));
        }
        // Log weights relative to k = 1; (k + q)^-s itself underflows for large s.
        let log_weights: Vec<f64> = (1..=n).map(|k| -s * ((k as f64 + q) / (1.0 + q)).ln()).collect();
        let log_harmonic = log_sum_exp(&log_weights);
        let pmf: Vec<f64> = log_weights.iter().map(|lw| (lw - log_harmonic).exp()).collect();

        let mut cumulative = Vec::with_capacity(n);
        let mut acc = 0.0;
        for p in &pmf {
            acc += p;
            cumulative.push(acc.min(1.0));
        }
        let mut tail = vec![0.0; n];
        let mut acc = 0.0;
        for k in (0..n).rev() {
            tail[k] = acc;
            acc += pmf[k];
        }
        // The last cumulative value is exactly 1 by construction.
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }
        Ok(Self { n, q, s, pmf, cumulative, tail })
    }

    /// Number of support points.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Shift parameter.
    pub fn q(&self) -> f64 {
        self.q
    }

    /// Exponent.
    pub fn s(&self) -> f64 {
        self.s
    }

    /// Raw moment `E[X^order]`.
    pub fn standard_moment(&self, order: u32) -> f64 {
        self.pmf.iter().enumerate().map(|(i, p)| p * ((i + 1) as f64).powi(order as i32)).sum()
    }

    fn central_moment(&self, order: i32) -> f64 {
        let mu = self.standard_moment(1);
        self.pmf.iter().enumerate().map(|(i, p)| p * ((i + 1) as f64 - mu).powi(order)).sum()
    }

    /// Support index `k` (1-based) of `x`, if `x` is a support point.
    fn support_index(&self, x: f64) -> Option<usize> {
        let k = x.round();
        if (x - k).abs() > SUPPORT_EPSILON || k < 1.0 || k > self.n as f64 {
            return None;
        }
        Some(k as usize)
    }

    /// Smallest `k` with `P(X <= k) >= level`.
    fn generalized_inverse(&self, level: f64) -> usize {
        let idx = self.cumulative.partition_point(|&c| c < level);
        idx.min(self.n - 1) + 1
    }
}

impl Distribution for ZipfMandelbrot {
    fn name(&self) -> &'static str {
        "ZipfMandelbrot"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn range(&self) -> Interval {
        scalar_range(1.0, self.n as f64)
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.n as f64, self.q, self.s]
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["N".into(), "q".into(), "s".into()]
    }

    fn pdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(1, x.len())?;
        Ok(self.support_index(x[0]).map_or(0.0, |k| self.pmf[k - 1]))
    }

    fn cdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(1, x.len())?;
        let k = (x[0] + SUPPORT_EPSILON).floor();
        if k < 1.0 {
            return Ok(0.0);
        }
        if k >= self.n as f64 {
            return Ok(1.0);
        }
        Ok(self.cumulative[k as usize - 1])
    }

    fn complementary_cdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(1, x.len())?;
        let k = (x[0] + SUPPORT_EPSILON).floor();
        if k < 1.0 {
            return Ok(1.0);
        }
        if k >= self.n as f64 {
            return Ok(0.0);
        }
        Ok(self.tail[k as usize - 1])
    }

    fn realization(&self, rng: &mut RandomStream) -> Result<Point> {
        Ok(vec![self.generalized_inverse(rng.uniform()) as f64])
    }

    fn mean(&self) -> Result<Point> {
        Ok(vec![self.standard_moment(1)])
    }

    fn covariance(&self) -> Result<DMatrix<f64>> {
        Ok(DMatrix::from_element(1, 1, self.central_moment(2)))
    }

    fn skewness(&self) -> Result<Point> {
        let var = self.central_moment(2);
        Ok(vec![self.central_moment(3) / var.powf(1.5)])
    }

    fn kurtosis(&self) -> Result<Point> {
        let var = self.central_moment(2);
        Ok(vec![self.central_moment(4) / (var * var)])
    }

    fn entropy(&self) -> Result<f64> {
        Ok(-self.pmf.iter().filter(|&&p| p > 0.0).map(|p| p * p.ln()).sum::<f64>())
    }

    fn quantile(&self, p: f64, tail: bool) -> Result<Point> {
        check_probability(p)?;
        if tail {
            // Smallest k with P(X > k) <= p.
            let idx = self.tail.partition_point(|&t| t > p);
            return Ok(vec![(idx.min(self.n - 1) + 1) as f64]);
        }
        Ok(vec![self.generalized_inverse(p) as f64])
    }

    fn inverse_survival(&self, p: f64) -> Result<Point> {
        self.quantile(p, true)
    }

    fn marginal_distinct(&self, _indices: &[usize]) -> Result<DistributionRef> {
        Ok(Arc::new(self.clone()))
    }

    fn is_continuous(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference() -> ZipfMandelbrot {
        ZipfMandelbrot::new(15, 1.2, 2.0).unwrap()
    }

    #[test]
    fn test_pmf_sums_to_one_and_cdf_steps() {
        let z = reference();
        let total: f64 = (1..=15).map(|k| z.pdf(&[k as f64]).unwrap()).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-14);
        let pdf_fd = z.cdf(&[5.0]).unwrap() - z.cdf(&[4.0]).unwrap();
        assert_relative_eq!(z.pdf(&[5.0]).unwrap(), pdf_fd, epsilon = 1e-14);
        assert_eq!(z.pdf(&[5.5]).unwrap(), 0.0);
        assert_eq!(z.cdf(&[0.5]).unwrap(), 0.0);
        assert_eq!(z.cdf(&[15.0]).unwrap(), 1.0);
    }

    #[test]
    fn test_quantile_is_generalized_inverse() {
        let z = reference();
        let q = z.quantile(0.95, false).unwrap()[0];
        assert_eq!(q, 10.0);
        assert!(z.cdf(&[q]).unwrap() >= 0.95);
        assert!(z.cdf(&[q - 1.0]).unwrap() < 0.95);
        assert_eq!(z.quantile(0.0, false).unwrap()[0], 1.0);
        assert_eq!(z.quantile(1.0, false).unwrap()[0], 15.0);
        let t = z.quantile(0.05, true).unwrap()[0];
        assert!(z.survival(&[t]).unwrap() <= 0.05);
        assert!(z.survival(&[t - 1.0]).unwrap() > 0.05);
    }

    #[test]
    fn test_moments() {
        let z = reference();
        assert_eq!(z.standard_moment(0), z.pmf.iter().sum::<f64>());
        let m = z.mean().unwrap()[0];
        let var = z.covariance().unwrap()[(0, 0)];
        assert_relative_eq!(var, z.standard_moment(2) - m * m, epsilon = 1e-12);
        assert!(z.entropy().unwrap() > 0.0);
        assert!(!z.is_continuous());
        assert!(!z.is_elliptical());
    }

    #[test]
    fn test_steep_exponent_stays_normalised() {
        let z = ZipfMandelbrot::new(15, 10.0, 400.0).unwrap();
        let total: f64 = (1..=15).map(|k| z.pdf(&[k as f64]).unwrap()).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-14);
        for k in 1..=15 {
            let p = z.pdf(&[k as f64]).unwrap();
            assert!(p.is_finite() && p >= 0.0, "pdf({k})={p}");
        }
        // P(2) / P(1) = (11 / 12)^400
        let ratio = z.pdf(&[2.0]).unwrap() / z.pdf(&[1.0]).unwrap();
        assert_relative_eq!(ratio, (-400.0 * (12.0f64 / 11.0).ln()).exp(), max_relative = 1e-10);
        assert!(z.pdf(&[2.0]).unwrap() > 0.0);
        assert!(z.cdf(&[1.0]).unwrap() < 1.0);
        assert_relative_eq!(z.survival(&[1.0]).unwrap(), z.pdf(&[2.0]).unwrap(), max_relative = 1e-6);
        let mean = z.mean().unwrap()[0];
        assert!(mean.is_finite() && mean > 1.0 && mean < 1.0 + 1e-12);
        let h = z.entropy().unwrap();
        assert!(h.is_finite() && h > 0.0);
        assert_eq!(z.quantile(0.5, false).unwrap()[0], 1.0);
    }

    #[test]
    fn test_invalid() {
        assert!(ZipfMandelbrot::new(0, 1.0, 1.0).is_err());
        assert!(ZipfMandelbrot::new(3, -1.0, 1.0).is_err());
        assert!(ZipfMandelbrot::new(3, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_sampling_stays_on_support() {
        let z = reference();
        let mut rng = RandomStream::new(0);
        let s = z.sample(1000, &mut rng).unwrap();
        for p in s.iter() {
            assert!(z.pdf(p).unwrap() > 0.0);
        }
    }
}
