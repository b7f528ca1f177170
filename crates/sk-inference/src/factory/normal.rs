use std::sync::Arc;

use nalgebra::DMatrix;
use sk_core::{Error, Result, Sample};
use sk_prob::{DistributionRef, Normal};

use super::{DEGENERATE_SCALE, DistributionFactory, check_sample};

/// Moment estimator of the (multivariate) normal law.
///
/// Mean and unbiased standard deviation per coordinate, Pearson correlation
/// between coordinates. Constant coordinates get `DEGENERATE_SCALE` as
/// standard deviation and no correlation with the others.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalFactory;

impl NormalFactory {
    /// Create the factory.
    pub fn new() -> Self {
        Self
    }

    /// Estimate a [`Normal`] from `sample`.
    pub fn build_as_normal(&self, sample: &Sample) -> Result<Normal> {
        check_sample(sample, None, "Normal")?;
        let d = sample.dimension();
        let mean = sample.compute_mean();
        let sigma: Vec<f64> = if sample.size() < 2 {
            vec![DEGENERATE_SCALE; d]
        } else {
            sample.compute_standard_deviation().into_iter().map(|s| s.max(DEGENERATE_SCALE)).collect()
        };
        if sigma.iter().any(|&s| s == DEGENERATE_SCALE) {
            log::debug!("Normal factory: sample with zero spread, using scale {DEGENERATE_SCALE:e}");
        }
        let correlation = if d == 1 || sample.size() < 2 { DMatrix::identity(d, d) } else { sample.compute_pearson_correlation() };
        match Normal::multivariate(mean.clone(), sigma.clone(), correlation) {
            Ok(n) => Ok(n),
            // Collinear columns: keep the marginals.
            Err(Error::InvalidParameter(msg)) => {
                log::warn!("Normal factory: {msg}; falling back to independent components");
                Normal::independent(mean, sigma)
            }
            Err(e) => Err(e),
        }
    }

    /// Normal law from `[means..., sigmas..., strict lower triangle of R]`.
    pub fn build_from_flat(&self, parameters: &[f64]) -> Result<Normal> {
        let d = dimension_from_count(parameters.len())?;
        let mean = parameters[..d].to_vec();
        let sigma = parameters[d..2 * d].to_vec();
        let mut correlation = DMatrix::identity(d, d);
        let mut k = 2 * d;
        for i in 0..d {
            for j in 0..i {
                correlation[(i, j)] = parameters[k];
                correlation[(j, i)] = parameters[k];
                k += 1;
            }
        }
        Normal::multivariate(mean, sigma, correlation)
    }
}

/// Solve `2d + d(d-1)/2 = count` for `d >= 1`.
fn dimension_from_count(count: usize) -> Result<usize> {
    (1..=count)
        .take_while(|d| 2 * d <= count)
        .find(|d| 2 * d + d * (d - 1) / 2 == count)
        .ok_or_else(|| Error::InvalidParameter(format!("{count} is not a valid Normal parameter count")))
}

impl DistributionFactory for NormalFactory {
    fn name(&self) -> &'static str {
        "Normal"
    }

    fn build_from_sample(&self, sample: &Sample) -> Result<DistributionRef> {
        Ok(Arc::new(self.build_as_normal(sample)?))
    }

    fn build_default(&self) -> Result<DistributionRef> {
        Ok(Arc::new(Normal::standard()))
    }

    fn build_from_parameters(&self, parameters: &[f64]) -> Result<DistributionRef> {
        Ok(Arc::new(self.build_from_flat(parameters)?))
    }
}
