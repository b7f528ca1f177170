//! # sk-prob
//!
//! Probability building blocks for StochKit:
//! - the polymorphic [`Distribution`] trait and its catalogue (normal, uniform,
//!   Weibull, Zipf-Mandelbrot, copulas, composed and marginal laws),
//! - seeded random streams and the sampling engine,
//! - quantiles, confidence regions and conditional decompositions,
//! - small numeric kernels (stable math, quadrature, root finding, MVN CDF).

#![warn(clippy::all)]

pub mod conditional;
pub mod copula;
pub mod distribution;
pub mod joint;
pub mod marginal;
pub mod math;
pub mod mvn;
pub mod normal;
pub mod quadrature;
pub mod quantile;
pub mod rng;
pub mod sampling;
pub mod solver;
pub mod transforms;
pub mod uniform;
pub mod weibull;
pub mod zipf_mandelbrot;

pub use conditional::{InverseIsoProbabilisticTransformation, IsoProbabilisticTransformation};
pub use copula::{ClaytonCopula, IndependentCopula, NormalCopula};
pub use distribution::{Distribution, DistributionRef};
pub use joint::{JointDistribution, compose};
pub use marginal::MarginalDistribution;
pub use normal::Normal;
pub use quadrature::QuadratureConfig;
pub use quantile::LevelSet;
pub use rng::RandomStream;
pub use sampling::MonteCarloConfig;
pub use solver::{RootSolver, SolverConfig};
pub use uniform::Uniform;
pub use weibull::{WeibullMax, WeibullMin};
pub use zipf_mandelbrot::ZipfMandelbrot;
