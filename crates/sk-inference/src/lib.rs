//! # sk-inference
//!
//! Estimation for StochKit.
//!
//! This crate provides:
//! - a generic L-BFGS optimizer on top of `argmin`,
//! - maximum-likelihood estimation for any `LogDensityModel`,
//! - distribution factories building catalogue laws from samples, defaults
//!   or flat parameter vectors.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Distribution factories (moment, rank and likelihood based estimators).
pub mod factory;
/// Maximum-likelihood estimation via L-BFGS.
pub mod mle;
/// Generic numerical optimizer (L-BFGS backend).
pub mod optimizer;

pub use factory::{
    ClaytonCopulaFactory, DEGENERATE_SCALE, DistributionFactory, JointDistributionFactory, NormalCopulaFactory,
    NormalFactory, UniformFactory, WeibullMaxFactory, WeibullMinFactory,
};
pub use mle::MaximumLikelihoodEstimator;
pub use optimizer::{LbfgsOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig};
