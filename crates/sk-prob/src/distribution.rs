//! The polymorphic distribution interface.
//!
//! Every law (univariate, multivariate, copula, composed) implements
//! [`Distribution`]. Only the primitive evaluations are required; quantiles,
//! survival functions, conditional decompositions and marginal extraction come
//! with generic default implementations that concrete types override when a
//! closed form exists.

use std::fmt;
use std::sync::Arc;

use nalgebra::DMatrix;
use sk_core::{Interval, Point, Result, Sample, check_dimension};

use crate::rng::RandomStream;
use crate::solver::SolverConfig;
use crate::{conditional, marginal, quantile};

/// Shared, thread-safe handle to a distribution.
pub type DistributionRef = Arc<dyn Distribution>;

/// Univariate range `[lower, upper]`; reversed bounds fall back to the whole line.
pub(crate) fn scalar_range(lower: f64, upper: f64) -> Interval {
    Interval::scalar(lower, upper).unwrap_or_else(|_| Interval::unbounded(1))
}

/// Univariate or multivariate probability law.
pub trait Distribution: Send + Sync + fmt::Debug {
    /// Family name, e.g. `"Normal"`.
    fn name(&self) -> &'static str;

    /// Dimension of the random vector.
    fn dimension(&self) -> usize;

    /// Smallest box containing the support.
    fn range(&self) -> Interval;

    /// Flat parameter vector, ordered as [`Self::parameter_names`].
    fn parameters(&self) -> Vec<f64>;

    /// Names of the entries of [`Self::parameters`].
    fn parameter_names(&self) -> Vec<String>;

    /// Density (probability mass for discrete laws) at `x`.
    fn pdf(&self, x: &[f64]) -> Result<f64>;

    /// Log density at `x`.
    fn log_pdf(&self, x: &[f64]) -> Result<f64> {
        Ok(self.pdf(x)?.ln())
    }

    /// `P(X <= x)` componentwise.
    fn cdf(&self, x: &[f64]) -> Result<f64>;

    /// `1 - cdf(x)`.
    fn complementary_cdf(&self, x: &[f64]) -> Result<f64> {
        Ok(1.0 - self.cdf(x)?)
    }

    /// `P(X > x)` componentwise.
    ///
    /// Univariate laws use the complementary CDF; multivariate laws fall back to
    /// inclusion-exclusion over the joint CDF of the marginals.
    fn survival(&self, x: &[f64]) -> Result<f64> {
        check_dimension(self.dimension(), x.len())?;
        if self.dimension() == 1 {
            return self.complementary_cdf(x);
        }
        quantile::survival_by_inclusion_exclusion(self, x)
    }

    /// One draw.
    fn realization(&self, rng: &mut RandomStream) -> Result<Point>;

    /// `size` independent draws.
    fn sample(&self, size: usize, rng: &mut RandomStream) -> Result<Sample> {
        let mut out = Sample::with_capacity(self.dimension(), size);
        for _ in 0..size {
            out.push(&self.realization(rng)?)?;
        }
        Ok(out)
    }

    /// Mean vector.
    fn mean(&self) -> Result<Point>;

    /// Covariance matrix.
    fn covariance(&self) -> Result<DMatrix<f64>>;

    /// Componentwise standard deviation.
    fn standard_deviation(&self) -> Result<Point> {
        let cov = self.covariance()?;
        Ok((0..self.dimension()).map(|i| cov[(i, i)].sqrt()).collect())
    }

    /// Componentwise skewness.
    fn skewness(&self) -> Result<Point>;

    /// Componentwise (non-excess) kurtosis.
    fn kurtosis(&self) -> Result<Point>;

    /// Differential entropy (Shannon entropy for discrete laws).
    fn entropy(&self) -> Result<f64>;

    /// Quantile at level `p`, or `1 - p` when `tail` is set.
    ///
    /// Multivariate laws return the point on the marginal-quantile curve
    /// whose joint CDF equals the level.
    fn quantile(&self, p: f64, tail: bool) -> Result<Point> {
        quantile::compute_quantile(self, p, tail, &SolverConfig::default())
    }

    /// Point `x` on the marginal-quantile curve with `survival(x) = p`.
    fn inverse_survival(&self, p: f64) -> Result<Point> {
        quantile::compute_inverse_survival(self, p, &SolverConfig::default())
    }

    /// Joint law of the coordinates `indices`, which are distinct and in range.
    fn marginal_distinct(&self, indices: &[usize]) -> Result<DistributionRef>;

    /// Joint law of the coordinates `indices` (any order, duplicates allowed).
    fn marginal(&self, indices: &[usize]) -> Result<DistributionRef> {
        marginal::extract(self, indices)
    }

    /// Whether the law has a density w.r.t. Lebesgue measure.
    fn is_continuous(&self) -> bool {
        true
    }

    /// Whether the law is elliptical.
    fn is_elliptical(&self) -> bool {
        false
    }

    /// Whether the law is a copula.
    fn is_copula(&self) -> bool {
        false
    }

    /// Whether the dependence structure is an elliptical copula.
    fn has_elliptical_copula(&self) -> bool {
        self.dimension() == 1
    }

    /// Whether the dependence structure is the independent copula.
    fn has_independent_copula(&self) -> bool {
        self.dimension() == 1
    }

    /// Density of coordinate `y.len()` at `x` given the preceding coordinates `y`.
    fn conditional_pdf(&self, x: f64, y: &[f64]) -> Result<f64> {
        conditional::generic_conditional_pdf(self, x, y)
    }

    /// CDF of coordinate `y.len()` at `x` given the preceding coordinates `y`.
    fn conditional_cdf(&self, x: f64, y: &[f64]) -> Result<f64> {
        conditional::generic_conditional_cdf(self, x, y)
    }

    /// Quantile of coordinate `y.len()` at level `q` given the preceding coordinates `y`.
    fn conditional_quantile(&self, q: f64, y: &[f64]) -> Result<f64> {
        conditional::generic_conditional_quantile(self, q, y, &SolverConfig::default())
    }

    /// `[f(x_0), f(x_1 | x_0), ..., f(x_{d-1} | x_0..x_{d-2})]`.
    fn sequential_conditional_pdf(&self, x: &[f64]) -> Result<Point> {
        conditional::sequential_pdf(self, x)
    }

    /// `[F(x_0), F(x_1 | x_0), ...]`.
    fn sequential_conditional_cdf(&self, x: &[f64]) -> Result<Point> {
        conditional::sequential_cdf(self, x)
    }

    /// Inverse of [`Self::sequential_conditional_cdf`].
    fn sequential_conditional_quantile(&self, q: &[f64]) -> Result<Point> {
        conditional::sequential_quantile(self, q)
    }
}
