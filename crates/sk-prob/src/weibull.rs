//! Weibull distributions for minima (`WeibullMin`) and maxima (`WeibullMax`).
//!
//! Parameters follow the order `(beta, alpha, gamma)`: scale, shape, location.
//! `WeibullMax(beta, alpha, gamma)` is the law of `gamma - W` where
//! `W ~ WeibullMin(beta, alpha, 0)`.

use std::sync::Arc;

use nalgebra::DMatrix;
use sk_core::{Error, Interval, Point, Result, check_dimension, check_probability};
use statrs::function::gamma::gamma;

use crate::distribution::{Distribution, DistributionRef, scalar_range};
use crate::rng::RandomStream;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Log-PDF of a two-parameter Weibull distribution at `x` with shape `k` and scale `lambda`.
///
/// Support: `x >= 0`.
pub fn logpdf(x: f64, k: f64, lambda: f64) -> Result<f64> {
    if !k.is_finite() || k <= 0.0 {
        return Err(Error::Validation(format!("k must be finite and > 0, got {}", k)));
    }
    if !lambda.is_finite() || lambda <= 0.0 {
        return Err(Error::Validation(format!(
            "lambda must be finite and > 0, got {}",
            lambda
        )));
    }
    if x < 0.0 {
        return Ok(f64::NEG_INFINITY);
    }
    if x == 0.0 {
        if k < 1.0 {
            return Ok(f64::INFINITY);
        }
        if k > 1.0 {
            return Ok(f64::NEG_INFINITY);
        }
        // k == 1 => exponential with rate 1/lambda
        return Ok(-lambda.ln());
    }

    let x_over_l = x / lambda;
    Ok(k.ln() - lambda.ln() + (k - 1.0) * x_over_l.ln() - x_over_l.powf(k))
}

fn validate(beta: f64, alpha: f64, gamma_loc: f64) -> Result<()> {
    if !(beta.is_finite() && beta > 0.0) {
        return Err(Error::InvalidParameter(format!("beta must be finite and > 0, got {beta}")));
    }
    if !(alpha.is_finite() && alpha > 0.0) {
        return Err(Error::InvalidParameter(format!("alpha must be finite and > 0, got {alpha}")));
    }
    if !gamma_loc.is_finite() {
        return Err(Error::InvalidParameter(format!("gamma must be finite, got {gamma_loc}")));
    }
    Ok(())
}

/// Shape-only moment helpers of the standard Weibull law `W(1, alpha)`.
#[derive(Debug, Clone, Copy)]
struct ShapeMoments {
    g1: f64,
    g2: f64,
    g3: f64,
    g4: f64,
}

impl ShapeMoments {
    fn new(alpha: f64) -> Self {
        let g = |k: f64| gamma(1.0 + k / alpha);
        Self { g1: g(1.0), g2: g(2.0), g3: g(3.0), g4: g(4.0) }
    }

    fn variance(&self) -> f64 {
        self.g2 - self.g1 * self.g1
    }

    fn skewness(&self) -> f64 {
        let (g1, g2, g3) = (self.g1, self.g2, self.g3);
        (g3 - 3.0 * g1 * g2 + 2.0 * g1.powi(3)) / self.variance().powf(1.5)
    }

    fn kurtosis(&self) -> f64 {
        let (g1, g2, g3, g4) = (self.g1, self.g2, self.g3, self.g4);
        (g4 - 4.0 * g1 * g3 + 6.0 * g1 * g1 * g2 - 3.0 * g1.powi(4)) / self.variance().powi(2)
    }
}

/// Entropy shared by both Weibull families.
fn weibull_entropy(beta: f64, alpha: f64) -> f64 {
    EULER_GAMMA * (1.0 - 1.0 / alpha) + (beta / alpha).ln() + 1.0
}

/// Weibull law for minima, support `[gamma, inf)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeibullMin {
    beta: f64,
    alpha: f64,
    gamma: f64,
}

impl WeibullMin {
    /// Create `WeibullMin(beta, alpha, gamma)`.
    pub fn new(beta: f64, alpha: f64, gamma: f64) -> Result<Self> {
        validate(beta, alpha, gamma)?;
        Ok(Self { beta, alpha, gamma })
    }

    /// Scale.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Shape.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Location.
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// `((x - gamma) / beta)^alpha`, zero below the support.
    fn power(&self, x: f64) -> f64 {
        let t = x - self.gamma;
        if t <= 0.0 { 0.0 } else { (t / self.beta).powf(self.alpha) }
    }
}

impl Distribution for WeibullMin {
    fn name(&self) -> &'static str {
        "WeibullMin"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn range(&self) -> Interval {
        scalar_range(self.gamma, f64::INFINITY)
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.beta, self.alpha, self.gamma]
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["beta".into(), "alpha".into(), "gamma".into()]
    }

    fn pdf(&self, x: &[f64]) -> Result<f64> {
        Ok(self.log_pdf(x)?.exp())
    }

    fn log_pdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(1, x.len())?;
        logpdf(x[0] - self.gamma, self.alpha, self.beta)
    }

    fn cdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(1, x.len())?;
        Ok(-(-self.power(x[0])).exp_m1())
    }

    fn complementary_cdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(1, x.len())?;
        Ok((-self.power(x[0])).exp())
    }

    fn realization(&self, rng: &mut RandomStream) -> Result<Point> {
        Ok(vec![self.gamma + self.beta * (-rng.uniform().ln()).powf(1.0 / self.alpha)])
    }

    fn mean(&self) -> Result<Point> {
        Ok(vec![self.gamma + self.beta * gamma(1.0 + 1.0 / self.alpha)])
    }

    fn covariance(&self) -> Result<DMatrix<f64>> {
        let v = self.beta * self.beta * ShapeMoments::new(self.alpha).variance();
        Ok(DMatrix::from_element(1, 1, v))
    }

    fn skewness(&self) -> Result<Point> {
        Ok(vec![ShapeMoments::new(self.alpha).skewness()])
    }

    fn kurtosis(&self) -> Result<Point> {
        Ok(vec![ShapeMoments::new(self.alpha).kurtosis()])
    }

    fn entropy(&self) -> Result<f64> {
        Ok(weibull_entropy(self.beta, self.alpha))
    }

    fn quantile(&self, p: f64, tail: bool) -> Result<Point> {
        check_probability(p)?;
        // -ln(1 - level), computed from whichever of p / 1-p is given exactly.
        let h = if tail { -p.ln() } else { -(-p).ln_1p() };
        Ok(vec![self.gamma + self.beta * h.powf(1.0 / self.alpha)])
    }

    fn inverse_survival(&self, p: f64) -> Result<Point> {
        self.quantile(p, true)
    }

    fn marginal_distinct(&self, _indices: &[usize]) -> Result<DistributionRef> {
        Ok(Arc::new(*self))
    }
}

/// Weibull law for maxima, support `(-inf, gamma]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeibullMax {
    beta: f64,
    alpha: f64,
    gamma: f64,
}

impl WeibullMax {
    /// Create `WeibullMax(beta, alpha, gamma)`.
    pub fn new(beta: f64, alpha: f64, gamma: f64) -> Result<Self> {
        validate(beta, alpha, gamma)?;
        Ok(Self { beta, alpha, gamma })
    }

    /// Scale.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Shape.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Location (upper end of the support).
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// The mirrored `WeibullMin(beta, alpha, -gamma)` law of `-X`.
    pub fn mirrored(&self) -> WeibullMin {
        WeibullMin { beta: self.beta, alpha: self.alpha, gamma: -self.gamma }
    }

    fn power(&self, x: f64) -> f64 {
        let t = self.gamma - x;
        if t <= 0.0 { 0.0 } else { (t / self.beta).powf(self.alpha) }
    }
}

impl Distribution for WeibullMax {
    fn name(&self) -> &'static str {
        "WeibullMax"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn range(&self) -> Interval {
        scalar_range(f64::NEG_INFINITY, self.gamma)
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.beta, self.alpha, self.gamma]
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["beta".into(), "alpha".into(), "gamma".into()]
    }

    fn pdf(&self, x: &[f64]) -> Result<f64> {
        Ok(self.log_pdf(x)?.exp())
    }

    fn log_pdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(1, x.len())?;
        logpdf(self.gamma - x[0], self.alpha, self.beta)
    }

    fn cdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(1, x.len())?;
        Ok((-self.power(x[0])).exp())
    }

    fn complementary_cdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(1, x.len())?;
        Ok(-(-self.power(x[0])).exp_m1())
    }

    fn realization(&self, rng: &mut RandomStream) -> Result<Point> {
        Ok(vec![self.gamma - self.beta * (-rng.uniform().ln()).powf(1.0 / self.alpha)])
    }

    fn mean(&self) -> Result<Point> {
        Ok(vec![self.gamma - self.beta * gamma(1.0 + 1.0 / self.alpha)])
    }

    fn covariance(&self) -> Result<DMatrix<f64>> {
        self.mirrored().covariance()
    }

    fn skewness(&self) -> Result<Point> {
        Ok(vec![-ShapeMoments::new(self.alpha).skewness()])
    }

    fn kurtosis(&self) -> Result<Point> {
        self.mirrored().kurtosis()
    }

    fn entropy(&self) -> Result<f64> {
        Ok(weibull_entropy(self.beta, self.alpha))
    }

    fn quantile(&self, p: f64, tail: bool) -> Result<Point> {
        check_probability(p)?;
        // X <= x  <=>  -X >= -x, so level p of X is level 1-p of the mirror.
        let m = self.mirrored().quantile(p, !tail)?;
        Ok(vec![-m[0]])
    }

    fn inverse_survival(&self, p: f64) -> Result<Point> {
        self.quantile(p, true)
    }

    fn marginal_distinct(&self, _indices: &[usize]) -> Result<DistributionRef> {
        Ok(Arc::new(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_weibull_k1_matches_exponential() {
        let x: f64 = 0.7;
        let rate: f64 = 2.0;
        let lp_w = logpdf(x, 1.0, 1.0 / rate).unwrap();
        assert!((lp_w - (rate.ln() - rate * x)).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_support() {
        let lp = logpdf(-0.1, 2.0, 1.0).unwrap();
        assert!(lp.is_infinite() && lp.is_sign_negative());
        let w = WeibullMin::new(1.0, 2.0, 3.0).unwrap();
        assert_eq!(w.pdf(&[2.5]).unwrap(), 0.0);
        assert_eq!(w.cdf(&[2.5]).unwrap(), 0.0);
        let m = WeibullMax::new(1.0, 2.0, 3.0).unwrap();
        assert_eq!(m.pdf(&[3.5]).unwrap(), 0.0);
        assert_eq!(m.cdf(&[3.5]).unwrap(), 1.0);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(WeibullMin::new(0.0, 1.0, 0.0), Err(Error::InvalidParameter(_))));
        assert!(WeibullMax::new(1.0, -1.0, 0.0).is_err());
        assert!(WeibullMax::new(1.0, 1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_min_moments_shape_two() {
        // Rayleigh-like: alpha = 2 => mean = beta * sqrt(pi)/2
        let w = WeibullMin::new(2.0, 2.0, -1.0).unwrap();
        assert_relative_eq!(w.mean().unwrap()[0], -1.0 + std::f64::consts::PI.sqrt(), epsilon = 1e-12);
        let var = 4.0 * (1.0 - std::f64::consts::PI / 4.0);
        assert_relative_eq!(w.covariance().unwrap()[(0, 0)], var, epsilon = 1e-12);
        // Shape 1 reduces to the exponential: skewness 2, kurtosis 9.
        let e = WeibullMin::new(1.5, 1.0, 0.0).unwrap();
        assert_relative_eq!(e.skewness().unwrap()[0], 2.0, epsilon = 1e-10);
        assert_relative_eq!(e.kurtosis().unwrap()[0], 9.0, epsilon = 1e-9);
        assert_relative_eq!(e.entropy().unwrap(), 1.0 + 1.5f64.ln(), epsilon = 1e-14);
    }

    #[test]
    fn test_max_is_mirror_of_min() {
        let m = WeibullMax::new(2.0, 1.5, -0.5).unwrap();
        let w = m.mirrored();
        for x in [-4.0, -1.2, -0.6] {
            assert_relative_eq!(m.pdf(&[x]).unwrap(), w.pdf(&[-x]).unwrap(), epsilon = 1e-14);
            assert_relative_eq!(m.cdf(&[x]).unwrap(), w.survival(&[-x]).unwrap(), epsilon = 1e-14);
        }
        assert_relative_eq!(m.mean().unwrap()[0], -w.mean().unwrap()[0], epsilon = 1e-14);
        assert_relative_eq!(m.skewness().unwrap()[0], -w.skewness().unwrap()[0], epsilon = 1e-14);
    }

    #[test]
    fn test_quantile_roundtrip() {
        let w = WeibullMin::new(2.0, 1.5, -0.5).unwrap();
        let m = WeibullMax::new(2.0, 1.5, -0.5).unwrap();
        for p in [1e-10, 0.05, 0.5, 0.95, 1.0 - 1e-10] {
            let q = w.quantile(p, false).unwrap();
            assert_relative_eq!(w.cdf(&q).unwrap(), p, epsilon = 1e-12);
            let q = m.quantile(p, false).unwrap();
            assert_relative_eq!(m.cdf(&q).unwrap(), p, epsilon = 1e-12);
            let s = m.inverse_survival(p).unwrap();
            assert_relative_eq!(m.survival(&s).unwrap(), p, epsilon = 1e-12);
        }
    }
}
