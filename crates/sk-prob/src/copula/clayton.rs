use std::sync::Arc;

use nalgebra::DMatrix;
use sk_core::{Error, Interval, Point, Result, check_dimension, check_probability};

use super::{UNIFORM_KURTOSIS, UNIFORM_MEAN, UNIFORM_VARIANCE, check_conditioning, in_open_cube};
use crate::distribution::{Distribution, DistributionRef};
use crate::math::log1pexp;
use crate::quadrature::{GaussLegendre, QuadratureConfig};
use crate::rng::RandomStream;
use crate::sampling::MonteCarloConfig;

/// Bivariate Clayton copula `C(u, v) = (u^-θ + v^-θ - 1)^(-1/θ)`, `θ >= -1`, `θ != 0`.
///
/// Every evaluation works on `log S` with `S = u^-θ + v^-θ - 1`, which keeps the
/// formulas stable when `θ` approaches 0 (independence) or grows large
/// (comonotonicity), and at points close to the boundary of the unit square.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaytonCopula {
    theta: f64,
}

impl ClaytonCopula {
    /// Create the copula; requires finite `θ >= -1` and `θ != 0`.
    pub fn new(theta: f64) -> Result<Self> {
        if !theta.is_finite() || theta < -1.0 || theta == 0.0 {
            return Err(Error::InvalidParameter(format!(
                "theta must be finite, >= -1 and != 0, got {theta}"
            )));
        }
        Ok(Self { theta })
    }

    /// Dependence parameter.
    pub fn theta(&self) -> f64 {
        self.theta
    }

    /// Kendall's tau `θ / (θ + 2)`.
    pub fn kendall_tau(&self) -> f64 {
        self.theta / (self.theta + 2.0)
    }

    /// `log S(u, v)` from `log u` and `log v`; `None` when `S <= 0`
    /// (the zero region of the copula for negative `θ`).
    fn log_s(&self, lu: f64, lv: f64) -> Option<f64> {
        let a = -self.theta * lu;
        let b = -self.theta * lv;
        if self.theta < 0.0 {
            let inner = a.exp_m1() + b.exp_m1();
            return if inner <= -1.0 { None } else { Some(inner.ln_1p()) };
        }
        let m = a.max(b);
        if m < 1.0 {
            Some((a.exp_m1() + b.exp_m1()).ln_1p())
        } else {
            Some(m + ((a - m).exp() + (b - m).exp() - (-m).exp()).ln())
        }
    }

    fn cdf_inner(&self, u: f64, v: f64) -> f64 {
        if u <= 0.0 || v <= 0.0 {
            return 0.0;
        }
        if u >= 1.0 {
            return v.min(1.0);
        }
        if v >= 1.0 {
            return u;
        }
        match self.log_s(u.ln(), v.ln()) {
            Some(ls) => (-ls / self.theta).exp().min(u.min(v)),
            None => 0.0,
        }
    }

    /// `∂C/∂u (u, v)`: the CDF of `V` given `U = u`.
    fn conditional_cdf_inner(&self, v: f64, u: f64) -> f64 {
        if v <= 0.0 {
            return 0.0;
        }
        if v >= 1.0 {
            return 1.0;
        }
        if !(u > 0.0 && u < 1.0) {
            // Conditioning on a boundary value: null set, fall back to the marginal.
            return v;
        }
        let lu = u.ln();
        match self.log_s(lu, v.ln()) {
            Some(ls) => (-(self.theta + 1.0) * lu - ls - ls / self.theta).exp().clamp(0.0, 1.0),
            None => 0.0,
        }
    }

    /// Inverse in `v` of [`Self::conditional_cdf_inner`].
    fn conditional_quantile_inner(&self, q: f64, u: f64) -> f64 {
        if q <= 0.0 {
            return 0.0;
        }
        if q >= 1.0 {
            return 1.0;
        }
        if self.theta == -1.0 {
            // Countermonotonic limit: V = 1 - U.
            return 1.0 - u;
        }
        let theta = self.theta;
        let lu = u.ln();
        // v = (1 + u^-θ (q^(-θ/(1+θ)) - 1))^(-1/θ)
        let a = (-theta / (1.0 + theta) * q.ln()).exp_m1();
        let v = if theta > 0.0 {
            let log_b = -theta * lu + a.ln();
            (-log1pexp(log_b) / theta).exp()
        } else {
            let b = (-theta * lu).exp() * a;
            (-b.ln_1p() / theta).exp()
        };
        v.clamp(0.0, 1.0)
    }

    /// Spearman-type Hoeffding integral `∬ C(u,v) - uv du dv`.
    pub fn hoeffding_covariance(&self, config: &QuadratureConfig) -> f64 {
        let gl = GaussLegendre::new(config.nodes_per_panel);
        let (xs, ws) = gl.composite_nodes(0.0, 1.0, config.panels);
        let mut acc = 0.0;
        for (u, wu) in xs.iter().zip(&ws) {
            for (v, wv) in xs.iter().zip(&ws) {
                acc += wu * wv * (self.cdf_inner(*u, *v) - u * v);
            }
        }
        acc
    }

    /// Entropy `-E[log c(U, V)]` estimated on a seeded Monte Carlo sample.
    pub fn entropy_monte_carlo(&self, config: &MonteCarloConfig) -> Result<f64> {
        let mut rng = RandomStream::new(config.seed);
        let mut acc = 0.0;
        for _ in 0..config.size {
            let x = self.realization(&mut rng)?;
            let lp = self.log_pdf(&x)?;
            if lp.is_finite() {
                acc -= lp;
            }
        }
        Ok(acc / config.size.max(1) as f64)
    }
}

impl Distribution for ClaytonCopula {
    fn name(&self) -> &'static str {
        "ClaytonCopula"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn range(&self) -> Interval {
        Interval::unit(2)
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.theta]
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["theta".into()]
    }

    fn pdf(&self, x: &[f64]) -> Result<f64> {
        Ok(self.log_pdf(x)?.exp())
    }

    fn log_pdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(2, x.len())?;
        if !in_open_cube(x) {
            return Ok(f64::NEG_INFINITY);
        }
        let (lu, lv) = (x[0].ln(), x[1].ln());
        let theta = self.theta;
        Ok(match self.log_s(lu, lv) {
            Some(ls) => theta.ln_1p() - (theta + 1.0) * (lu + lv) - 2.0 * ls - ls / theta,
            None => f64::NEG_INFINITY,
        })
    }

    fn cdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(2, x.len())?;
        Ok(self.cdf_inner(x[0], x[1]))
    }

    fn survival(&self, x: &[f64]) -> Result<f64> {
        check_dimension(2, x.len())?;
        let u = x[0].clamp(0.0, 1.0);
        let v = x[1].clamp(0.0, 1.0);
        Ok((1.0 - u - v + self.cdf_inner(u, v)).clamp(0.0, 1.0))
    }

    fn realization(&self, rng: &mut RandomStream) -> Result<Point> {
        let u = rng.uniform();
        let w = rng.uniform();
        Ok(vec![u, self.conditional_quantile_inner(w, u)])
    }

    fn mean(&self) -> Result<Point> {
        Ok(vec![UNIFORM_MEAN; 2])
    }

    fn covariance(&self) -> Result<DMatrix<f64>> {
        let c = self.hoeffding_covariance(&QuadratureConfig::default());
        Ok(DMatrix::from_row_slice(2, 2, &[UNIFORM_VARIANCE, c, c, UNIFORM_VARIANCE]))
    }

    fn skewness(&self) -> Result<Point> {
        Ok(vec![0.0; 2])
    }

    fn kurtosis(&self) -> Result<Point> {
        Ok(vec![UNIFORM_KURTOSIS; 2])
    }

    fn entropy(&self) -> Result<f64> {
        self.entropy_monte_carlo(&MonteCarloConfig::default())
    }

    fn marginal_distinct(&self, indices: &[usize]) -> Result<DistributionRef> {
        if indices.len() == 1 {
            return Ok(Arc::new(super::IndependentCopula::new(1)?));
        }
        // Exchangeable: both orderings of the pair give the same copula.
        Ok(Arc::new(*self))
    }

    fn is_copula(&self) -> bool {
        true
    }

    fn has_elliptical_copula(&self) -> bool {
        false
    }

    fn has_independent_copula(&self) -> bool {
        false
    }

    fn conditional_pdf(&self, x: f64, y: &[f64]) -> Result<f64> {
        check_conditioning(2, y)?;
        match y.first() {
            None => Ok(if (0.0..=1.0).contains(&x) { 1.0 } else { 0.0 }),
            Some(&u) => self.pdf(&[u, x]),
        }
    }

    fn conditional_cdf(&self, x: f64, y: &[f64]) -> Result<f64> {
        check_conditioning(2, y)?;
        match y.first() {
            None => Ok(x.clamp(0.0, 1.0)),
            Some(&u) => Ok(self.conditional_cdf_inner(x, u)),
        }
    }

    fn conditional_quantile(&self, q: f64, y: &[f64]) -> Result<f64> {
        check_conditioning(2, y)?;
        check_probability(q)?;
        match y.first() {
            None => Ok(q),
            Some(&u) => Ok(self.conditional_quantile_inner(q, u)),
        }
    }
}
