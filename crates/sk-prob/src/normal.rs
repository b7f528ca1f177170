//! Normal distribution: scalar special functions and the (multivariate) law.

use std::f64::consts::SQRT_2;
use std::sync::Arc;

use nalgebra::DMatrix;
use sk_core::{Error, Interval, Point, Result, check_dimension, check_probability};
use statrs::function::erf::{erfc, erfc_inv};

use crate::distribution::{Distribution, DistributionRef};
use crate::marginal::check_indices;
use crate::rng::RandomStream;
use crate::solver::SolverConfig;
use crate::{mvn, quantile};

/// Natural log of `sqrt(2π)`.
///
/// `ln(sqrt(2π)) = 0.5*ln(2π)` (precomputed to keep this crate const-friendly).
pub(crate) const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// Log-PDF of a Normal distribution `N(mu, sigma)` at `x`.
///
/// `log p(x) = -0.5 * ((x-mu)/sigma)^2 - ln(sigma) - ln(sqrt(2π))`
pub fn logpdf(x: f64, mu: f64, sigma: f64) -> Result<f64> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(Error::Validation(format!("sigma must be finite and > 0, got {}", sigma)));
    }
    let z = (x - mu) / sigma;
    Ok(-0.5 * z * z - sigma.ln() - LN_SQRT_2PI)
}

/// Standard normal density.
#[inline]
pub fn standard_pdf(z: f64) -> f64 {
    (-0.5 * z * z - LN_SQRT_2PI).exp()
}

/// Standard normal CDF `Phi(z)`, accurate in both tails.
#[inline]
pub fn standard_cdf(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    0.5 * erfc(-z / SQRT_2)
}

/// Standard normal quantile `Phi^{-1}(p)`; `±inf` at 0 and 1.
#[inline]
pub fn standard_quantile(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    -SQRT_2 * erfc_inv(2.0 * p)
}

/// Normal law `N(μ, diag(σ) R diag(σ))` in any dimension.
#[derive(Debug, Clone)]
pub struct Normal {
    mean: Vec<f64>,
    sigma: Vec<f64>,
    correlation: DMatrix<f64>,
    /// Lower Cholesky factor of `correlation`.
    cholesky: DMatrix<f64>,
    log_det_correlation: f64,
    independent: bool,
}

impl Normal {
    /// Univariate `N(mu, sigma)`.
    pub fn new(mu: f64, sigma: f64) -> Result<Self> {
        Self::multivariate(vec![mu], vec![sigma], DMatrix::identity(1, 1))
    }

    /// Standard univariate normal.
    pub fn standard() -> Self {
        Self {
            mean: vec![0.0],
            sigma: vec![1.0],
            correlation: DMatrix::identity(1, 1),
            cholesky: DMatrix::identity(1, 1),
            log_det_correlation: 0.0,
            independent: true,
        }
    }

    /// Multivariate normal with independent components.
    pub fn independent(mean: Vec<f64>, sigma: Vec<f64>) -> Result<Self> {
        let d = mean.len();
        Self::multivariate(mean, sigma, DMatrix::identity(d, d))
    }

    /// Multivariate normal from means, standard deviations and a correlation matrix.
    pub fn multivariate(mean: Vec<f64>, sigma: Vec<f64>, correlation: DMatrix<f64>) -> Result<Self> {
        let d = mean.len();
        if d == 0 {
            return Err(Error::InvalidParameter("Normal dimension must be >= 1".into()));
        }
        check_dimension(d, sigma.len())?;
        if let Some(m) = mean.iter().find(|m| !m.is_finite()) {
            return Err(Error::InvalidParameter(format!("mean must be finite, got {m}")));
        }
        if let Some(s) = sigma.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(Error::InvalidParameter(format!("sigma must be finite and > 0, got {s}")));
        }
        let cholesky = correlation_cholesky(&correlation, d)?;
        let log_det_correlation = 2.0 * (0..d).map(|i| cholesky[(i, i)].ln()).sum::<f64>();
        let independent = mvn::is_identity(&correlation);
        Ok(Self { mean, sigma, correlation, cholesky, log_det_correlation, independent })
    }

    /// Correlation matrix `R`.
    pub fn correlation(&self) -> &DMatrix<f64> {
        &self.correlation
    }

    /// Componentwise standard deviations.
    pub fn sigma(&self) -> &[f64] {
        &self.sigma
    }

    fn standardize(&self, x: &[f64]) -> Vec<f64> {
        x.iter().zip(&self.mean).zip(&self.sigma).map(|((x, m), s)| (x - m) / s).collect()
    }

    /// Mean and standard deviation of coordinate `y.len()` given the leading coordinates `y`.
    fn conditional_moments(&self, y: &[f64]) -> Result<(f64, f64)> {
        let k = y.len();
        if k >= self.dimension() {
            return Err(Error::dimension(self.dimension() - 1, k));
        }
        let z = self.standardize(y);
        let eps = forward_substitution(&self.cholesky, &z);
        let m: f64 = (0..k).map(|j| self.cholesky[(k, j)] * eps[j]).sum();
        let s = self.cholesky[(k, k)];
        Ok((self.mean[k] + self.sigma[k] * m, self.sigma[k] * s))
    }
}

/// Validate a correlation matrix and return its lower Cholesky factor.
pub(crate) fn correlation_cholesky(r: &DMatrix<f64>, d: usize) -> Result<DMatrix<f64>> {
    if r.nrows() != d || r.ncols() != d {
        return Err(Error::dimension(d, r.nrows()));
    }
    for i in 0..d {
        if (r[(i, i)] - 1.0).abs() > 1e-12 {
            return Err(Error::InvalidParameter(format!(
                "correlation diagonal must be 1, got R[{i},{i}]={}",
                r[(i, i)]
            )));
        }
        for j in 0..i {
            let v = r[(i, j)];
            if !v.is_finite() || v.abs() > 1.0 || (v - r[(j, i)]).abs() > 1e-12 {
                return Err(Error::InvalidParameter(format!(
                    "correlation must be symmetric with entries in [-1, 1], got R[{i},{j}]={v}"
                )));
            }
        }
    }
    r.clone()
        .cholesky()
        .map(|ch| ch.l())
        .ok_or_else(|| Error::InvalidParameter("correlation matrix is not positive definite".into()))
}

/// Solve `L w = z` for lower-triangular `L`, using only the leading `z.len()` rows.
pub(crate) fn forward_substitution(l: &DMatrix<f64>, z: &[f64]) -> Vec<f64> {
    let mut w = Vec::with_capacity(z.len());
    for i in 0..z.len() {
        let s: f64 = (0..i).map(|j| l[(i, j)] * w[j]).sum();
        w.push((z[i] - s) / l[(i, i)]);
    }
    w
}

impl Distribution for Normal {
    fn name(&self) -> &'static str {
        "Normal"
    }

    fn dimension(&self) -> usize {
        self.mean.len()
    }

    fn range(&self) -> Interval {
        Interval::unbounded(self.dimension())
    }

    fn parameters(&self) -> Vec<f64> {
        let d = self.dimension();
        let mut p = self.mean.clone();
        p.extend_from_slice(&self.sigma);
        for i in 0..d {
            for j in 0..i {
                p.push(self.correlation[(i, j)]);
            }
        }
        p
    }

    fn parameter_names(&self) -> Vec<String> {
        let d = self.dimension();
        if d == 1 {
            return vec!["mu".into(), "sigma".into()];
        }
        let mut names: Vec<String> = (0..d).map(|i| format!("mean_{i}")).collect();
        names.extend((0..d).map(|i| format!("sigma_{i}")));
        for i in 0..d {
            for j in 0..i {
                names.push(format!("R_{i}_{j}"));
            }
        }
        names
    }

    fn pdf(&self, x: &[f64]) -> Result<f64> {
        Ok(self.log_pdf(x)?.exp())
    }

    fn log_pdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(self.dimension(), x.len())?;
        if self.dimension() == 1 {
            return logpdf(x[0], self.mean[0], self.sigma[0]);
        }
        let w = forward_substitution(&self.cholesky, &self.standardize(x));
        let quad: f64 = w.iter().map(|v| v * v).sum();
        let log_sigma: f64 = self.sigma.iter().map(|s| s.ln()).sum();
        Ok(-0.5 * quad - log_sigma - 0.5 * self.log_det_correlation - self.dimension() as f64 * LN_SQRT_2PI)
    }

    fn cdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(self.dimension(), x.len())?;
        let z = self.standardize(x);
        Ok(mvn::orthant_cdf(&z, &self.correlation, &self.cholesky))
    }

    fn complementary_cdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(self.dimension(), x.len())?;
        if self.dimension() == 1 {
            return Ok(standard_cdf(-(x[0] - self.mean[0]) / self.sigma[0]));
        }
        Ok(1.0 - self.cdf(x)?)
    }

    fn survival(&self, x: &[f64]) -> Result<f64> {
        check_dimension(self.dimension(), x.len())?;
        // P(X > x) = P(-Z <= -z) and -Z has the same correlation.
        let z: Vec<f64> = self.standardize(x).into_iter().map(|v| -v).collect();
        Ok(mvn::orthant_cdf(&z, &self.correlation, &self.cholesky))
    }

    fn realization(&self, rng: &mut RandomStream) -> Result<Point> {
        let d = self.dimension();
        let eps: Vec<f64> = (0..d).map(|_| rng.standard_normal()).collect();
        Ok((0..d)
            .map(|i| {
                let z: f64 = (0..=i).map(|j| self.cholesky[(i, j)] * eps[j]).sum();
                self.mean[i] + self.sigma[i] * z
            })
            .collect())
    }

    fn mean(&self) -> Result<Point> {
        Ok(self.mean.clone())
    }

    fn covariance(&self) -> Result<DMatrix<f64>> {
        let d = self.dimension();
        Ok(DMatrix::from_fn(d, d, |i, j| self.sigma[i] * self.sigma[j] * self.correlation[(i, j)]))
    }

    fn standard_deviation(&self) -> Result<Point> {
        Ok(self.sigma.clone())
    }

    fn skewness(&self) -> Result<Point> {
        Ok(vec![0.0; self.dimension()])
    }

    fn kurtosis(&self) -> Result<Point> {
        Ok(vec![3.0; self.dimension()])
    }

    fn entropy(&self) -> Result<f64> {
        let d = self.dimension() as f64;
        let log_sigma: f64 = self.sigma.iter().map(|s| s.ln()).sum();
        Ok(d * (0.5 + LN_SQRT_2PI) + log_sigma + 0.5 * self.log_det_correlation)
    }

    fn quantile(&self, p: f64, tail: bool) -> Result<Point> {
        check_probability(p)?;
        if self.dimension() == 1 {
            let z = if tail { -standard_quantile(p) } else { standard_quantile(p) };
            return Ok(vec![self.mean[0] + self.sigma[0] * z]);
        }
        quantile::compute_quantile(self, p, tail, &SolverConfig::default())
    }

    fn inverse_survival(&self, p: f64) -> Result<Point> {
        check_probability(p)?;
        if self.dimension() == 1 {
            return Ok(vec![self.mean[0] - self.sigma[0] * standard_quantile(p)]);
        }
        quantile::compute_inverse_survival(self, p, &SolverConfig::default())
    }

    fn marginal_distinct(&self, indices: &[usize]) -> Result<DistributionRef> {
        check_indices(self.dimension(), indices)?;
        if indices.len() == self.dimension() && indices.iter().enumerate().all(|(i, &j)| i == j) {
            return Ok(Arc::new(self.clone()));
        }
        let mean = indices.iter().map(|&i| self.mean[i]).collect();
        let sigma = indices.iter().map(|&i| self.sigma[i]).collect();
        let k = indices.len();
        let r = DMatrix::from_fn(k, k, |a, b| self.correlation[(indices[a], indices[b])]);
        Ok(Arc::new(Normal::multivariate(mean, sigma, r)?))
    }

    fn is_elliptical(&self) -> bool {
        true
    }

    fn has_elliptical_copula(&self) -> bool {
        true
    }

    fn has_independent_copula(&self) -> bool {
        self.independent
    }

    fn conditional_pdf(&self, x: f64, y: &[f64]) -> Result<f64> {
        let (m, s) = self.conditional_moments(y)?;
        Ok(standard_pdf((x - m) / s) / s)
    }

    fn conditional_cdf(&self, x: f64, y: &[f64]) -> Result<f64> {
        let (m, s) = self.conditional_moments(y)?;
        Ok(standard_cdf((x - m) / s))
    }

    fn conditional_quantile(&self, q: f64, y: &[f64]) -> Result<f64> {
        check_probability(q)?;
        let (m, s) = self.conditional_moments(y)?;
        Ok(m + s * standard_quantile(q))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TWO_PI: f64 = 2.0 * std::f64::consts::PI;

    #[test]
    fn test_standard_at_zero() {
        let lp = logpdf(0.0, 0.0, 1.0).unwrap();
        assert!((lp + LN_SQRT_2PI).abs() < 1e-12);
    }

    #[test]
    fn test_symmetry() {
        let lp1 = logpdf(1.3, 0.0, 2.0).unwrap();
        let lp2 = logpdf(-1.3, 0.0, 2.0).unwrap();
        assert!((lp1 - lp2).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_sigma() {
        assert!(logpdf(0.0, 0.0, 0.0).is_err());
        assert!(Normal::new(0.0, -1.0).is_err());
        assert!(Normal::new(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_special_functions() {
        assert_relative_eq!(standard_cdf(0.0), 0.5, epsilon = 1e-16);
        assert_relative_eq!(standard_cdf(1.959_963_984_540_054), 0.975, epsilon = 1e-14);
        assert_relative_eq!(standard_quantile(0.975), 1.959_963_984_540_054, epsilon = 1e-12);
        // Far tail keeps relative accuracy.
        let p = standard_cdf(-30.0);
        assert!(p > 0.0 && p < 1e-190);
        assert_relative_eq!(standard_quantile(1e-12), -7.034_483_825_691_1, epsilon = 1e-6);
        assert_eq!(standard_quantile(0.0), f64::NEG_INFINITY);
    }

    #[test]
    fn test_univariate_moments_and_entropy() {
        let n = Normal::new(1.0, 2.0).unwrap();
        assert_eq!(n.mean().unwrap(), vec![1.0]);
        assert_relative_eq!(n.covariance().unwrap()[(0, 0)], 4.0);
        assert_relative_eq!(n.entropy().unwrap(), 0.5 * (TWO_PI * std::f64::consts::E * 4.0).ln(), epsilon = 1e-14);
        assert_relative_eq!(n.survival(&[1.0]).unwrap(), 0.5, epsilon = 1e-15);
        let q = n.inverse_survival(0.1).unwrap();
        assert_relative_eq!(n.survival(&q).unwrap(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_multivariate_pdf_matches_product_when_independent() {
        let n = Normal::independent(vec![0.0, 1.0], vec![1.0, 2.0]).unwrap();
        let x = [0.3, -0.4];
        let expected = logpdf(0.3, 0.0, 1.0).unwrap() + logpdf(-0.4, 1.0, 2.0).unwrap();
        assert_relative_eq!(n.log_pdf(&x).unwrap(), expected, epsilon = 1e-13);
        assert!(n.has_independent_copula());
    }

    #[test]
    fn test_bivariate_pdf_closed_form() {
        let rho: f64 = 0.6;
        let r = DMatrix::from_row_slice(2, 2, &[1.0, rho, rho, 1.0]);
        let n = Normal::multivariate(vec![0.0, 0.0], vec![1.0, 1.0], r).unwrap();
        let (x, y) = (0.5, -0.2);
        let q = (x * x - 2.0 * rho * x * y + y * y) / (1.0 - rho * rho);
        let expected = (-0.5 * q).exp() / (TWO_PI * (1.0 - rho * rho).sqrt());
        assert_relative_eq!(n.pdf(&[x, y]).unwrap(), expected, epsilon = 1e-14);
    }

    #[test]
    fn test_conditional_matches_regression() {
        let rho = 0.5;
        let r = DMatrix::from_row_slice(2, 2, &[1.0, rho, rho, 1.0]);
        let n = Normal::multivariate(vec![1.0, -1.0], vec![2.0, 3.0], r).unwrap();
        // X1 | X0=y ~ N(mu1 + rho s1/s0 (y-mu0), s1^2 (1-rho^2))
        let y = 2.0;
        let m = -1.0 + rho * 3.0 / 2.0 * (y - 1.0);
        let s = 3.0 * (1.0f64 - rho * rho).sqrt();
        assert_relative_eq!(n.conditional_cdf(m, &[y]).unwrap(), 0.5, epsilon = 1e-14);
        assert_relative_eq!(n.conditional_quantile(0.8, &[y]).unwrap(), m + s * standard_quantile(0.8), epsilon = 1e-12);
        assert!(n.conditional_pdf(0.0, &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_rejects_bad_correlation() {
        let r = DMatrix::from_row_slice(2, 2, &[1.0, 1.5, 1.5, 1.0]);
        assert!(matches!(
            Normal::multivariate(vec![0.0, 0.0], vec![1.0, 1.0], r),
            Err(Error::InvalidParameter(_))
        ));
        let r = DMatrix::from_row_slice(3, 3, &[1.0, 0.9, -0.9, 0.9, 1.0, 0.9, -0.9, 0.9, 1.0]);
        assert!(Normal::multivariate(vec![0.0; 3], vec![1.0; 3], r).is_err());
    }
}
