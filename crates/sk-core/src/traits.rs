//! Core traits for StochKit
//!
//! Estimation code (sk-inference) only sees models through [`LogDensityModel`],
//! so a distribution family becomes fittable by describing its parameters and
//! its negative log-likelihood.

use crate::Result;

/// A parametric model with a negative log-likelihood over a fixed dataset.
pub trait LogDensityModel: Send + Sync {
    /// Number of free parameters.
    fn dim(&self) -> usize;

    /// Parameter names (stable order).
    fn parameter_names(&self) -> Vec<String>;

    /// Parameter bounds `(min, max)`.
    fn parameter_bounds(&self) -> Vec<(f64, f64)>;

    /// Starting point for the optimizer.
    fn parameter_init(&self) -> Vec<f64>;

    /// Negative log-likelihood at `params`.
    fn nll(&self, params: &[f64]) -> Result<f64>;

    /// Gradient of the NLL (central differences unless overridden).
    fn grad_nll(&self, params: &[f64]) -> Result<Vec<f64>> {
        let n = params.len();
        let mut grad = vec![0.0; n];
        for i in 0..n {
            let eps = 1e-7 * params[i].abs().max(1.0);
            let mut plus = params.to_vec();
            plus[i] += eps;
            let mut minus = params.to_vec();
            minus[i] -= eps;
            grad[i] = (self.nll(&plus)? - self.nll(&minus)?) / (2.0 * eps);
        }
        Ok(grad)
    }
}
