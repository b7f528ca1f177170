//! Conditional decomposition and the Rosenblatt iso-probabilistic transformation.
//!
//! The generic forms below back the [`Distribution`] defaults for laws without
//! a closed-form conditional structure: the conditional density is a ratio of
//! marginal densities, the conditional CDF integrates it by Gauss-Legendre
//! quadrature and the conditional quantile inverts the CDF with the root solver.

use sk_core::{Point, Result, Sample, check_dimension, check_probability};

use crate::copula::check_conditioning;
use crate::distribution::{Distribution, DistributionRef};
use crate::normal::{standard_cdf, standard_quantile};
use crate::quadrature::{GaussLegendre, QuadratureConfig};
use crate::solver::{RootSolver, SolverConfig};

/// Density of the leading `k + 1` coordinates, built once per conditioning.
struct PrefixDensity<'a, D: Distribution + ?Sized> {
    full: &'a D,
    marginal: Option<DistributionRef>,
}

impl<'a, D: Distribution + ?Sized> PrefixDensity<'a, D> {
    fn new(full: &'a D, len: usize) -> Result<Self> {
        let marginal = if len == full.dimension() {
            None
        } else {
            Some(full.marginal_distinct(&(0..len).collect::<Vec<_>>())?)
        };
        Ok(Self { full, marginal })
    }

    fn pdf(&self, x: &[f64]) -> Result<f64> {
        match &self.marginal {
            Some(m) => m.pdf(x),
            None => self.full.pdf(x),
        }
    }
}

/// Evaluator of `f(x | y) = f_{k+1}(y, x) / f_k(y)` with `k = y.len()`.
fn conditional_density<'a, D: Distribution + ?Sized>(
    distribution: &'a D,
    y: &[f64],
) -> Result<impl Fn(f64) -> Result<f64> + 'a> {
    check_conditioning(distribution.dimension(), y)?;
    let k = y.len();
    let numerator = PrefixDensity::new(distribution, k + 1)?;
    let denominator = if k == 0 { 1.0 } else { PrefixDensity::new(distribution, k)?.pdf(y)? };
    let mut point = y.to_vec();
    point.push(0.0);
    Ok(move |x: f64| -> Result<f64> {
        if denominator.is_nan() || denominator <= 0.0 {
            return Ok(0.0);
        }
        let mut pt = point.clone();
        pt[k] = x;
        Ok(numerator.pdf(&pt)? / denominator)
    })
}

/// Conditional density by ratio of marginal densities.
pub(crate) fn generic_conditional_pdf<D: Distribution + ?Sized>(distribution: &D, x: f64, y: &[f64]) -> Result<f64> {
    conditional_density(distribution, y)?(x)
}

/// Conditional CDF by quadrature of the conditional density.
pub(crate) fn generic_conditional_cdf<D: Distribution + ?Sized>(distribution: &D, x: f64, y: &[f64]) -> Result<f64> {
    check_conditioning(distribution.dimension(), y)?;
    let k = y.len();
    if k == 0 {
        return distribution.marginal_distinct(&[0])?.cdf(&[x]);
    }
    let range = distribution.range();
    let (lo, hi) = (range.lower()[k], range.upper()[k]);
    if x <= lo {
        return Ok(0.0);
    }
    if x >= hi {
        return Ok(1.0);
    }
    let density = conditional_density(distribution, y)?;
    let config = QuadratureConfig::default();
    let gl = GaussLegendre::new(config.nodes_per_panel);
    let value = if lo.is_finite() {
        gl.integrate(&density, lo, x, config.panels)?
    } else {
        // t = x - u / (1 - u) maps [0, 1) onto (-inf, x].
        gl.integrate(
            |u| {
                let w = 1.0 - u;
                Ok(density(x - u / w)? / (w * w))
            },
            0.0,
            1.0,
            config.panels,
        )?
    };
    Ok(value.clamp(0.0, 1.0))
}

/// Conditional quantile by root finding on the conditional CDF.
pub(crate) fn generic_conditional_quantile<D: Distribution + ?Sized>(
    distribution: &D,
    q: f64,
    y: &[f64],
    config: &SolverConfig,
) -> Result<f64> {
    check_conditioning(distribution.dimension(), y)?;
    check_probability(q)?;
    let k = y.len();
    let marginal = distribution.marginal_distinct(&[k])?;
    if k == 0 {
        return Ok(marginal.quantile(q, false)?[0]);
    }
    let range = distribution.range();
    let (lo, hi) = (range.lower()[k], range.upper()[k]);
    if q <= 0.0 {
        return Ok(lo);
    }
    if q >= 1.0 {
        return Ok(hi);
    }
    let residual = |x: f64| -> Result<f64> { Ok(distribution.conditional_cdf(x, y)? - q) };
    let solver = RootSolver::new(*config);
    let (a, b) = if lo.is_finite() && hi.is_finite() {
        (lo, hi)
    } else {
        let start = marginal.quantile(q, false)?[0];
        let step = marginal
            .standard_deviation()
            .ok()
            .map(|s| s[0])
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(1.0);
        solver.bracket(residual, start.clamp(lo, hi), step, lo, hi)?
    };
    if a == b {
        return Ok(a);
    }
    solver.solve_with_derivative(
        |x| Ok((residual(x)?, distribution.conditional_pdf(x, y)?)),
        a,
        b,
        0.5 * (a + b),
    )
}

/// `[f(x_0), f(x_1 | x_0), ..., f(x_{d-1} | x_<d-1)]`.
pub(crate) fn sequential_pdf<D: Distribution + ?Sized>(distribution: &D, x: &[f64]) -> Result<Point> {
    check_dimension(distribution.dimension(), x.len())?;
    (0..x.len()).map(|k| distribution.conditional_pdf(x[k], &x[..k])).collect()
}

/// `[F(x_0), F(x_1 | x_0), ..., F(x_{d-1} | x_<d-1)]`.
pub(crate) fn sequential_cdf<D: Distribution + ?Sized>(distribution: &D, x: &[f64]) -> Result<Point> {
    check_dimension(distribution.dimension(), x.len())?;
    (0..x.len()).map(|k| distribution.conditional_cdf(x[k], &x[..k])).collect()
}

/// Inverse of [`sequential_cdf`]: coordinate `k` solves `F(x_k | x_<k) = q_k`.
pub(crate) fn sequential_quantile<D: Distribution + ?Sized>(distribution: &D, q: &[f64]) -> Result<Point> {
    check_dimension(distribution.dimension(), q.len())?;
    let mut x = Vec::with_capacity(q.len());
    for (k, &level) in q.iter().enumerate() {
        let xk = distribution.conditional_quantile(level, &x[..k])?;
        x.push(xk);
    }
    Ok(x)
}

/// Rosenblatt transformation to the standard normal space:
/// `z_k = Phi^{-1}(F(x_k | x_0..x_{k-1}))`.
#[derive(Debug, Clone)]
pub struct IsoProbabilisticTransformation {
    distribution: DistributionRef,
}

impl IsoProbabilisticTransformation {
    /// Transformation attached to `distribution`.
    pub fn new(distribution: DistributionRef) -> Self {
        Self { distribution }
    }

    /// Underlying law.
    pub fn distribution(&self) -> &DistributionRef {
        &self.distribution
    }

    /// Dimension of both spaces.
    pub fn dimension(&self) -> usize {
        self.distribution.dimension()
    }

    /// Map a point of the physical space to the standard space.
    pub fn evaluate(&self, x: &[f64]) -> Result<Point> {
        let u = self.distribution.sequential_conditional_cdf(x)?;
        Ok(u.into_iter().map(standard_quantile).collect())
    }

    /// Map every point of `sample`.
    pub fn evaluate_sample(&self, sample: &Sample) -> Result<Sample> {
        map_sample(sample, self.dimension(), |x| self.evaluate(x))
    }

    /// Map from the standard space back to the physical space.
    pub fn inverse(&self) -> InverseIsoProbabilisticTransformation {
        InverseIsoProbabilisticTransformation { distribution: self.distribution.clone() }
    }
}

/// Inverse Rosenblatt transformation: `x_k = F^{-1}(Phi(z_k) | x_0..x_{k-1})`.
#[derive(Debug, Clone)]
pub struct InverseIsoProbabilisticTransformation {
    distribution: DistributionRef,
}

impl InverseIsoProbabilisticTransformation {
    /// Transformation attached to `distribution`.
    pub fn new(distribution: DistributionRef) -> Self {
        Self { distribution }
    }

    /// Underlying law.
    pub fn distribution(&self) -> &DistributionRef {
        &self.distribution
    }

    /// Dimension of both spaces.
    pub fn dimension(&self) -> usize {
        self.distribution.dimension()
    }

    /// Map a point of the standard space back to the physical space.
    pub fn evaluate(&self, z: &[f64]) -> Result<Point> {
        check_dimension(self.dimension(), z.len())?;
        let u: Vec<f64> = z.iter().map(|&v| standard_cdf(v)).collect();
        self.distribution.sequential_conditional_quantile(&u)
    }

    /// Map every point of `sample`.
    pub fn evaluate_sample(&self, sample: &Sample) -> Result<Sample> {
        map_sample(sample, self.dimension(), |z| self.evaluate(z))
    }

    /// Forward Rosenblatt transformation.
    pub fn inverse(&self) -> IsoProbabilisticTransformation {
        IsoProbabilisticTransformation { distribution: self.distribution.clone() }
    }
}

fn map_sample<F>(sample: &Sample, dimension: usize, f: F) -> Result<Sample>
where
    F: Fn(&[f64]) -> Result<Point>,
{
    check_dimension(dimension, sample.dimension())?;
    let mut out = Sample::with_capacity(dimension, sample.size());
    for x in sample.iter() {
        out.push(&f(x)?)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normal::Normal;
    use crate::rng::RandomStream;
    use crate::uniform::Uniform;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use std::sync::Arc;

    fn correlated() -> Normal {
        let r = DMatrix::from_row_slice(2, 2, &[1.0, 0.6, 0.6, 1.0]);
        Normal::multivariate(vec![1.0, -2.0], vec![2.0, 0.5], r).unwrap()
    }

    #[test]
    fn test_generic_matches_gaussian_closed_form() {
        let n = correlated();
        let y = [2.5];
        for x in [-3.0, -2.2, -1.5] {
            assert_relative_eq!(
                generic_conditional_pdf(&n, x, &y).unwrap(),
                n.conditional_pdf(x, &y).unwrap(),
                max_relative = 1e-10
            );
            assert_relative_eq!(
                generic_conditional_cdf(&n, x, &y).unwrap(),
                n.conditional_cdf(x, &y).unwrap(),
                epsilon = 1e-8
            );
        }
        let q = generic_conditional_quantile(&n, 0.3, &y, &SolverConfig::default()).unwrap();
        assert_relative_eq!(q, n.conditional_quantile(0.3, &y).unwrap(), epsilon = 1e-6);
    }

    #[test]
    fn test_generic_first_coordinate_is_marginal() {
        let n = correlated();
        assert_relative_eq!(generic_conditional_cdf(&n, 1.0, &[]).unwrap(), 0.5, epsilon = 1e-14);
        assert!(generic_conditional_pdf(&n, 0.0, &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_sequential_roundtrip() {
        let n = correlated();
        let x = [0.3, -1.8];
        let u = n.sequential_conditional_cdf(&x).unwrap();
        let back = n.sequential_conditional_quantile(&u).unwrap();
        assert_relative_eq!(back[0], x[0], epsilon = 1e-9);
        assert_relative_eq!(back[1], x[1], epsilon = 1e-9);
        let f = n.sequential_conditional_pdf(&x).unwrap();
        assert_relative_eq!(f[0] * f[1], n.pdf(&x).unwrap(), max_relative = 1e-12);
    }

    #[test]
    fn test_iso_transformation_standardizes() {
        let u = Uniform::new(-1.0, 3.0).unwrap();
        let t = IsoProbabilisticTransformation::new(Arc::new(u));
        assert_relative_eq!(t.evaluate(&[1.0]).unwrap()[0], 0.0, epsilon = 1e-14);
        let n = correlated();
        let t = IsoProbabilisticTransformation::new(Arc::new(n.clone()));
        let s = n.sample(200, &mut RandomStream::new(11)).unwrap();
        let z = t.evaluate_sample(&s).unwrap();
        let back = t.inverse().evaluate_sample(&z).unwrap();
        for (a, b) in s.iter().zip(back.iter()) {
            assert_relative_eq!(a[0], b[0], epsilon = 1e-8);
            assert_relative_eq!(a[1], b[1], epsilon = 1e-8);
        }
    }
}
