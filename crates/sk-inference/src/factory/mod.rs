//! Factories building distributions from data, defaults or parameter vectors.
//!
//! Every factory implements [`DistributionFactory`] and, in addition, exposes a
//! typed builder (`build_as_normal`, `build_as_weibull_min`, ...) returning the
//! concrete law.

mod clayton;
mod joint;
mod normal;
mod normal_copula;
mod uniform;
mod weibull;

pub use clayton::ClaytonCopulaFactory;
pub use joint::JointDistributionFactory;
pub use normal::NormalFactory;
pub use normal_copula::NormalCopulaFactory;
pub use uniform::UniformFactory;
pub use weibull::{WeibullMaxFactory, WeibullMinFactory};

use sk_core::{Error, Result, Sample};
use sk_prob::DistributionRef;

/// Dispersion given to laws fitted on a sample with zero spread.
pub const DEGENERATE_SCALE: f64 = 1e-12;

/// Builds a distribution family from samples, defaults or flat parameters.
pub trait DistributionFactory: Send + Sync {
    /// Family name, e.g. `"Normal"`.
    fn name(&self) -> &'static str;

    /// Estimate the parameters of the family from `sample`.
    fn build_from_sample(&self, sample: &Sample) -> Result<DistributionRef>;

    /// Default member of the family.
    fn build_default(&self) -> Result<DistributionRef>;

    /// Member with the given parameters, laid out as `Distribution::parameters()`.
    fn build_from_parameters(&self, parameters: &[f64]) -> Result<DistributionRef>;
}

/// Reject empty samples and samples of the wrong dimension.
pub(crate) fn check_sample(sample: &Sample, dimension: Option<usize>, family: &str) -> Result<()> {
    if sample.is_empty() {
        return Err(Error::DegenerateInput(format!("cannot build a {family} from an empty sample")));
    }
    if let Some(d) = dimension {
        sk_core::check_dimension(d, sample.dimension())?;
    }
    Ok(())
}

pub(crate) fn check_parameter_count(parameters: &[f64], expected: usize, family: &str) -> Result<()> {
    if parameters.len() != expected {
        return Err(Error::InvalidParameter(format!(
            "{family} expects {expected} parameters, got {}",
            parameters.len()
        )));
    }
    Ok(())
}

/// `(min, max)` of a univariate sample.
pub(crate) fn extremes(sample: &Sample) -> (f64, f64) {
    (sample.min()[0], sample.max()[0])
}
