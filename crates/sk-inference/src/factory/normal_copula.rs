use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use nalgebra::DMatrix;
use sk_core::{Error, Result, Sample};
use sk_prob::{DistributionRef, NormalCopula};

use super::{DistributionFactory, check_sample};

/// Off-diagonal shrinkage applied while the estimated matrix is not positive definite.
const SHRINKAGE: f64 = 0.9;
const MAX_SHRINK_STEPS: usize = 200;

/// Normal copula estimator by inversion of Kendall's tau, `ρ = sin(πτ/2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalCopulaFactory;

impl NormalCopulaFactory {
    /// Create the factory.
    pub fn new() -> Self {
        Self
    }

    /// Estimate a [`NormalCopula`] from `sample`.
    pub fn build_as_normal_copula(&self, sample: &Sample) -> Result<NormalCopula> {
        check_sample(sample, None, "NormalCopula")?;
        let tau = sample.compute_kendall_tau();
        let d = sample.dimension();
        let mut r = DMatrix::from_fn(d, d, |i, j| if i == j { 1.0 } else { (FRAC_PI_2 * tau[(i, j)]).sin() });
        for step in 0..MAX_SHRINK_STEPS {
            if r.clone().cholesky().is_some() {
                if step > 0 {
                    log::warn!("NormalCopula factory: correlation shrunk {step} times to reach positive definiteness");
                }
                return NormalCopula::new(r);
            }
            for i in 0..d {
                for j in 0..d {
                    if i != j {
                        r[(i, j)] *= SHRINKAGE;
                    }
                }
            }
        }
        Err(Error::Computation("estimated correlation matrix is not positive definite".into()))
    }
}

impl DistributionFactory for NormalCopulaFactory {
    fn name(&self) -> &'static str {
        "NormalCopula"
    }

    fn build_from_sample(&self, sample: &Sample) -> Result<DistributionRef> {
        Ok(Arc::new(self.build_as_normal_copula(sample)?))
    }

    fn build_default(&self) -> Result<DistributionRef> {
        Ok(Arc::new(NormalCopula::new(DMatrix::identity(2, 2))?))
    }

    /// Parameters are the strict lower triangle of the correlation matrix, row by row.
    fn build_from_parameters(&self, parameters: &[f64]) -> Result<DistributionRef> {
        let d = (1..)
            .take_while(|d| d * (d - 1) / 2 <= parameters.len())
            .find(|d| d * (d - 1) / 2 == parameters.len() && *d >= 2)
            .ok_or_else(|| {
                Error::InvalidParameter(format!("{} is not a valid NormalCopula parameter count", parameters.len()))
            })?;
        let mut r = DMatrix::identity(d, d);
        let mut k = 0;
        for i in 0..d {
            for j in 0..i {
                r[(i, j)] = parameters[k];
                r[(j, i)] = parameters[k];
                k += 1;
            }
        }
        Ok(Arc::new(NormalCopula::new(r)?))
    }
}
