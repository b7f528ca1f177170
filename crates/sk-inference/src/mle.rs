//! Maximum-likelihood estimation for any [`LogDensityModel`].
//!
//! The negative log-likelihood is minimised with L-BFGS in an unconstrained
//! space obtained from the model's parameter bounds, so positive scales and
//! shapes are optimised on the log scale. Uncertainties come from the inverse
//! of a numerical Hessian taken in the original parameterisation.

use nalgebra::DMatrix;
use rayon::prelude::*;
use sk_core::{Error, FitResult, LogDensityModel, Result};
use sk_prob::transforms::ParameterTransform;

use crate::optimizer::{LbfgsOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig};

/// NLL of a model seen through a bijection of its parameters.
struct UnconstrainedObjective<'a, M: LogDensityModel + ?Sized> {
    model: &'a M,
    transform: ParameterTransform,
}

impl<M: LogDensityModel + ?Sized> ObjectiveFunction for UnconstrainedObjective<'_, M> {
    fn eval(&self, z: &[f64]) -> Result<f64> {
        self.model.nll(&self.transform.forward(z))
    }

    fn gradient(&self, z: &[f64]) -> Result<Vec<f64>> {
        // Chain rule through the diagonal Jacobian.
        let grad = self.model.grad_nll(&self.transform.forward(z))?;
        Ok(grad.iter().zip(self.transform.jacobian_diag(z)).map(|(g, j)| g * j).collect())
    }
}

/// Maximum likelihood estimator.
#[derive(Debug, Clone, Default)]
pub struct MaximumLikelihoodEstimator {
    config: OptimizerConfig,
}

impl MaximumLikelihoodEstimator {
    /// Estimator with the default optimizer settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimator with custom optimizer settings.
    pub fn with_config(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Optimizer settings.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Fit `model`, returning parameters, uncertainties and covariance.
    pub fn fit<M: LogDensityModel + ?Sized>(&self, model: &M) -> Result<FitResult> {
        let result = self.fit_minimum(model)?;
        let n = result.parameters.len();
        let hessian = self.compute_hessian(model, &result.parameters)?;

        let fit = match self.invert_hessian(&hessian, n) {
            Some(covariance) => {
                let uncertainties: Vec<f64> = (0..n).map(|i| covariance[(i, i)].sqrt()).collect();
                // Row-major; the matrix is symmetric.
                let flat: Vec<f64> = covariance.iter().copied().collect();
                FitResult::new(result.parameters, uncertainties, result.fval, result.converged, result.n_iter as usize)
                    .with_covariance(flat)
            }
            None => {
                log::warn!("Hessian inversion failed, using diagonal approximation");
                let uncertainties = self.diagonal_uncertainties(&hessian, n);
                FitResult::new(result.parameters, uncertainties, result.fval, result.converged, result.n_iter as usize)
            }
        };
        if !fit.converged {
            log::warn!("MLE did not converge: {}", result.message);
        }
        Ok(fit.with_message(result.message))
    }

    /// Minimise the NLL from `model.parameter_init()` without the Hessian step.
    pub fn fit_minimum<M: LogDensityModel + ?Sized>(&self, model: &M) -> Result<OptimizationResult> {
        let init = model.parameter_init();
        if init.len() != model.dim() {
            return Err(Error::Validation(format!(
                "parameter_init length {} != model.dim() {}",
                init.len(),
                model.dim()
            )));
        }
        let transform = ParameterTransform::from_bounds(&model.parameter_bounds());
        if transform.dim() != model.dim() {
            return Err(Error::Validation(format!(
                "parameter_bounds length {} != model.dim() {}",
                transform.dim(),
                model.dim()
            )));
        }
        let z0 = transform.inverse(&init);
        let objective = UnconstrainedObjective { model, transform };
        let free = vec![(f64::NEG_INFINITY, f64::INFINITY); z0.len()];
        let mut result = LbfgsOptimizer::new(self.config.clone()).minimize(&objective, &z0, &free)?;
        result.parameters = objective.transform.forward(&result.parameters);
        Ok(result)
    }

    /// Fit several models in parallel.
    pub fn fit_batch<M: LogDensityModel>(&self, models: &[M]) -> Vec<Result<FitResult>> {
        models.par_iter().map(|m| self.fit(m)).collect()
    }

    /// Forward differences of the gradient, symmetrised.
    fn compute_hessian<M: LogDensityModel + ?Sized>(&self, model: &M, best: &[f64]) -> Result<DMatrix<f64>> {
        let n = best.len();
        let center = model.grad_nll(best)?;
        let bounds = model.parameter_bounds();
        let mut hessian = DMatrix::zeros(n, n);
        for j in 0..n {
            let mut eps = 1e-4 * best[j].abs().max(1.0);
            // Step inwards when the forward point would leave the domain.
            if best[j] + eps >= bounds[j].1 {
                eps = -eps;
            }
            let mut shifted = best.to_vec();
            shifted[j] += eps;
            let g = model.grad_nll(&shifted)?;
            for i in 0..n {
                hessian[(i, j)] = (g[i] - center[i]) / eps;
            }
        }
        let ht = hessian.transpose();
        Ok((&hessian + &ht) * 0.5)
    }

    /// Damped Cholesky inverse; `None` when no positive variance can be obtained.
    fn invert_hessian(&self, hessian: &DMatrix<f64>, n: usize) -> Option<DMatrix<f64>> {
        let identity = DMatrix::identity(n, n);
        let diag_scale = (0..n).map(|i| hessian[(i, i)].abs()).fold(0.0_f64, f64::max).max(1.0);
        let mut damped = hessian.clone();
        let mut damping = 0.0_f64;
        for _ in 0..10 {
            if let Some(chol) = nalgebra::linalg::Cholesky::new(damped.clone()) {
                if damping > 0.0 {
                    log::debug!("Hessian inverted with diagonal damping {damping:e}");
                }
                return Some(chol.solve(&identity));
            }
            let next = if damping == 0.0 { diag_scale * 1e-9 } else { damping * 10.0 };
            for i in 0..n {
                damped[(i, i)] += next - damping;
            }
            damping = next;
        }
        let cov = damped.lu().try_inverse()?;
        (0..n).all(|i| cov[(i, i)].is_finite() && cov[(i, i)] > 0.0).then_some(cov)
    }

    fn diagonal_uncertainties(&self, hessian: &DMatrix<f64>, n: usize) -> Vec<f64> {
        (0..n).map(|i| 1.0 / hessian[(i, i)].abs().max(1e-12).sqrt()).collect()
    }
}
