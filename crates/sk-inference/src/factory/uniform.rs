use std::sync::Arc;

use sk_core::{Result, Sample};
use sk_prob::{DistributionRef, Uniform};

use super::{DEGENERATE_SCALE, DistributionFactory, check_parameter_count, check_sample, extremes};

/// Estimator of `U(a, b)` widening the sample range by one average spacing on each side.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformFactory;

impl UniformFactory {
    /// Create the factory.
    pub fn new() -> Self {
        Self
    }

    /// Estimate a [`Uniform`] from a univariate `sample`.
    pub fn build_as_uniform(&self, sample: &Sample) -> Result<Uniform> {
        check_sample(sample, Some(1), "Uniform")?;
        let (min, max) = extremes(sample);
        let n = sample.size();
        if max - min <= 0.0 || n < 2 {
            let half = 0.5 * DEGENERATE_SCALE * min.abs().max(1.0);
            log::debug!("Uniform factory: sample with zero spread at {min}");
            return Uniform::new(min - half, min + half);
        }
        let delta = (max - min) / (n - 1) as f64;
        Uniform::new(min - delta, max + delta)
    }
}

impl DistributionFactory for UniformFactory {
    fn name(&self) -> &'static str {
        "Uniform"
    }

    fn build_from_sample(&self, sample: &Sample) -> Result<DistributionRef> {
        Ok(Arc::new(self.build_as_uniform(sample)?))
    }

    fn build_default(&self) -> Result<DistributionRef> {
        Ok(Arc::new(Uniform::new(-1.0, 1.0)?))
    }

    fn build_from_parameters(&self, parameters: &[f64]) -> Result<DistributionRef> {
        check_parameter_count(parameters, 2, "Uniform")?;
        Ok(Arc::new(Uniform::new(parameters[0], parameters[1])?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sk_core::Error;
    use sk_prob::Distribution;

    #[test]
    fn test_widened_range() {
        let u = UniformFactory.build_as_uniform(&Sample::from_column(&[0.0, 1.0, 2.0, 3.0, 4.0])).unwrap();
        assert_relative_eq!(u.a(), -1.0, epsilon = 1e-12);
        assert_relative_eq!(u.b(), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_sample() {
        let u = UniformFactory.build_as_uniform(&Sample::from_column(&[3.0, 3.0, 3.0])).unwrap();
        assert_relative_eq!(u.mean().unwrap()[0], 3.0, epsilon = 1e-10);
        assert!(u.b() - u.a() < 1e-4);
    }

    #[test]
    fn test_parameters_and_dimension() {
        let u = UniformFactory.build_from_parameters(&[2.0, 5.0]).unwrap();
        assert_eq!(u.parameters(), vec![2.0, 5.0]);
        assert!(matches!(UniformFactory.build_from_parameters(&[5.0, 2.0]), Err(Error::InvalidParameter(_))));
        let bivariate = Sample::from_flat(2, vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(UniformFactory.build_from_sample(&bivariate), Err(Error::DimensionMismatch { .. })));
    }
}
