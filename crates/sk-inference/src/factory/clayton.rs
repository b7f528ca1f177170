use std::sync::Arc;

use sk_core::{Result, Sample};
use sk_prob::{ClaytonCopula, DistributionRef};

use super::{DistributionFactory, check_parameter_count, check_sample};

/// Smallest `|θ|` used when the sample shows no dependence.
const THETA_EPSILON: f64 = 1e-12;
/// `θ` used for comonotone samples (`τ = 1`).
const THETA_MAX: f64 = 1e6;

/// Clayton copula estimator by inversion of Kendall's tau, `θ = 2τ / (1 - τ)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaytonCopulaFactory;

impl ClaytonCopulaFactory {
    /// Create the factory.
    pub fn new() -> Self {
        Self
    }

    /// Estimate a [`ClaytonCopula`] from a bivariate `sample`.
    ///
    /// Only the ranks matter, so the sample may be given on its original scale.
    pub fn build_as_clayton_copula(&self, sample: &Sample) -> Result<ClaytonCopula> {
        check_sample(sample, Some(2), "ClaytonCopula")?;
        let tau = sample.compute_kendall_tau()[(0, 1)];
        ClaytonCopula::new(theta_from_tau(tau))
    }
}

/// `θ = 2τ / (1 - τ)`, kept inside the valid domain.
fn theta_from_tau(tau: f64) -> f64 {
    if tau >= 1.0 {
        log::warn!("Clayton factory: comonotone sample, clamping theta to {THETA_MAX:e}");
        return THETA_MAX;
    }
    let theta = (2.0 * tau / (1.0 - tau)).clamp(-1.0, THETA_MAX);
    if theta.abs() < THETA_EPSILON {
        log::debug!("Clayton factory: no dependence detected, theta set to {THETA_EPSILON:e}");
        return THETA_EPSILON;
    }
    theta
}

impl DistributionFactory for ClaytonCopulaFactory {
    fn name(&self) -> &'static str {
        "ClaytonCopula"
    }

    fn build_from_sample(&self, sample: &Sample) -> Result<DistributionRef> {
        Ok(Arc::new(self.build_as_clayton_copula(sample)?))
    }

    fn build_default(&self) -> Result<DistributionRef> {
        Ok(Arc::new(ClaytonCopula::new(2.0)?))
    }

    fn build_from_parameters(&self, parameters: &[f64]) -> Result<DistributionRef> {
        check_parameter_count(parameters, 1, "ClaytonCopula")?;
        Ok(Arc::new(ClaytonCopula::new(parameters[0])?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sk_prob::{Distribution, RandomStream};

    #[test]
    fn test_tau_inversion() {
        assert_relative_eq!(theta_from_tau(0.5), 2.0, epsilon = 1e-12);
        assert_relative_eq!(theta_from_tau(-1.0 / 3.0), -0.5, epsilon = 1e-12);
        assert_relative_eq!(theta_from_tau(-1.0), -1.0, epsilon = 1e-12);
        assert_eq!(theta_from_tau(0.0), THETA_EPSILON);
        assert_eq!(theta_from_tau(1.0), THETA_MAX);
    }

    #[test]
    fn test_recovers_theta() {
        let truth = ClaytonCopula::new(2.5).unwrap();
        let sample = truth.sample(2_000, &mut RandomStream::new(5)).unwrap();
        let fitted = ClaytonCopulaFactory.build_as_clayton_copula(&sample).unwrap();
        assert_relative_eq!(fitted.theta(), 2.5, max_relative = 0.1);
    }

    #[test]
    fn test_parameters() {
        let c = ClaytonCopulaFactory.build_from_parameters(&[1.5]).unwrap();
        assert!(c.is_copula());
        assert_eq!(c.parameters(), vec![1.5]);
        assert!(ClaytonCopulaFactory.build_from_parameters(&[0.0]).is_err());
    }
}
