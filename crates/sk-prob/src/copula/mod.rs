//! Copulas: distributions on the unit hypercube with uniform marginals.

mod clayton;
mod independent;
mod normal;

pub use clayton::ClaytonCopula;
pub use independent::IndependentCopula;
pub use normal::NormalCopula;

use sk_core::{Error, Result};

/// Moments shared by every copula (uniform marginals).
pub(crate) const UNIFORM_MEAN: f64 = 0.5;
pub(crate) const UNIFORM_VARIANCE: f64 = 1.0 / 12.0;
pub(crate) const UNIFORM_KURTOSIS: f64 = 1.8;

/// Reject a conditioning vector that is not shorter than the copula dimension.
pub(crate) fn check_conditioning(dimension: usize, y: &[f64]) -> Result<()> {
    if y.len() >= dimension {
        return Err(Error::dimension(dimension - 1, y.len()));
    }
    Ok(())
}

/// `true` when every coordinate lies strictly inside `(0, 1)`.
pub(crate) fn in_open_cube(u: &[f64]) -> bool {
    u.iter().all(|&v| v > 0.0 && v < 1.0)
}
