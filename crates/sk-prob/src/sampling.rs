//! Sampling engine and empirical estimators.

use nalgebra::DMatrix;
use rayon::prelude::*;
use sk_core::{Error, Point, Result, Sample};

use crate::distribution::Distribution;
use crate::rng::RandomStream;

/// Size and seed of the reference sample behind Monte Carlo estimates.
#[derive(Debug, Clone, Copy)]
pub struct MonteCarloConfig {
    /// Number of draws.
    pub size: usize,
    /// Seed of the dedicated random stream.
    pub seed: u64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self { size: 10_000, seed: 0 }
    }
}

/// Draw `size` points from `distribution` with the caller's stream.
pub fn sample<D: Distribution + ?Sized>(
    distribution: &D,
    size: usize,
    rng: &mut RandomStream,
) -> Result<Sample> {
    distribution.sample(size, rng)
}

/// Draw `size` points split into `chunks` blocks sampled in parallel.
///
/// Chunk `i` uses its own stream seeded `seed + i`, so the result depends on
/// `(seed, chunks)` only, never on the number of worker threads.
pub fn sample_parallel<D: Distribution + ?Sized>(
    distribution: &D,
    size: usize,
    seed: u64,
    chunks: usize,
) -> Result<Sample> {
    if chunks == 0 {
        return Err(Error::Validation("chunks must be >= 1".into()));
    }
    let base = size / chunks;
    let extra = size % chunks;
    let parts: Vec<Sample> = (0..chunks)
        .into_par_iter()
        .map(|i| {
            let n = base + usize::from(i < extra);
            let mut rng = RandomStream::new(seed.wrapping_add(i as u64));
            distribution.sample(n, &mut rng)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut out = Sample::with_capacity(distribution.dimension(), size);
    for part in &parts {
        for p in part.iter() {
            out.push(p)?;
        }
    }
    log::debug!("sample_parallel: {} points in {} chunks (seed={})", size, chunks, seed);
    Ok(out)
}

/// Empirical mean of a sample.
pub fn compute_mean(sample: &Sample) -> Result<Point> {
    if sample.is_empty() {
        return Err(Error::DegenerateInput("cannot compute the mean of an empty sample".into()));
    }
    Ok(sample.compute_mean())
}

/// Unbiased (`n - 1`) empirical covariance of a sample.
pub fn compute_covariance(sample: &Sample) -> Result<DMatrix<f64>> {
    if sample.size() < 2 {
        return Err(Error::DegenerateInput(format!(
            "covariance needs at least 2 points, got {}",
            sample.size()
        )));
    }
    Ok(sample.compute_covariance())
}
