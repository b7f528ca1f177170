//! Quantiles, inverse survival and confidence regions.
//!
//! Multivariate quantities follow one convention: points live on the
//! marginal-quantile curve `x(s) = (F_1^{-1}(s), ..., F_d^{-1}(s))` and boxes
//! are products of marginal intervals built at a common marginal level `α`,
//! which is tuned until the joint probability reaches the target.

use sk_core::{Error, Interval, Point, Result, check_dimension, check_probability};

use crate::distribution::{Distribution, DistributionRef};
use crate::rng::RandomStream;
use crate::sampling::MonteCarloConfig;
use crate::solver::{RootSolver, SolverConfig};

/// Golden-section ratio `(sqrt(5) - 1) / 2`.
const INV_PHI: f64 = 0.618_033_988_749_894_9;
/// Resolution of the golden-section search over the lower tail mass.
const GOLDEN_TOL: f64 = 1e-10;

/// Univariate marginals of `distribution`, in coordinate order.
pub(crate) fn univariate_marginals<D: Distribution + ?Sized>(distribution: &D) -> Result<Vec<DistributionRef>> {
    (0..distribution.dimension()).map(|i| distribution.marginal_distinct(&[i])).collect()
}

/// Solve a non-decreasing `f(s) = 0` on `[lower, upper]`, saturating at the ends.
fn solve_monotone<F>(mut f: F, lower: f64, upper: f64, config: &SolverConfig) -> Result<f64>
where
    F: FnMut(f64) -> Result<f64>,
{
    if f(lower)? >= 0.0 {
        return Ok(lower);
    }
    if f(upper)? <= 0.0 {
        return Ok(upper);
    }
    RootSolver::new(*config).solve(f, lower, upper)
}

/// Quantile of a univariate law at `level`.
pub(crate) fn univariate_quantile<D: Distribution + ?Sized>(
    distribution: &D,
    level: f64,
    config: &SolverConfig,
) -> Result<f64> {
    let range = distribution.range();
    let (lo, hi) = (range.lower()[0], range.upper()[0]);
    if level <= 0.0 {
        return Ok(lo);
    }
    if level >= 1.0 {
        return Ok(hi);
    }
    if !distribution.is_continuous() {
        return discrete_quantile(distribution, level, lo, hi, config);
    }

    // Above the median, match the complementary CDF to keep right-tail accuracy.
    let upper_half = level > 0.5;
    let target = if upper_half { 1.0 - level } else { level };
    let residual = |x: f64| -> Result<f64> {
        let pt = [x];
        Ok(if upper_half {
            target - distribution.complementary_cdf(&pt)?
        } else {
            distribution.cdf(&pt)? - target
        })
    };

    let solver = RootSolver::new(*config);
    let (a, b) = if lo.is_finite() && hi.is_finite() {
        (lo, hi)
    } else {
        let start = distribution
            .mean()
            .ok()
            .map(|m| m[0])
            .filter(|m| m.is_finite())
            .unwrap_or(0.0)
            .clamp(lo, hi);
        let step = distribution
            .standard_deviation()
            .ok()
            .map(|s| s[0])
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(1.0);
        solver.bracket(residual, start, step, lo, hi)?
    };
    if a == b {
        return Ok(a);
    }
    solver.solve_with_derivative(
        |x| Ok((residual(x)?, distribution.pdf(&[x])?)),
        a,
        b,
        0.5 * (a + b),
    )
}

/// Smallest integer support point `k` with `F(k) >= level`.
fn discrete_quantile<D: Distribution + ?Sized>(
    distribution: &D,
    level: f64,
    lo: f64,
    hi: f64,
    config: &SolverConfig,
) -> Result<f64> {
    let cdf = |k: f64| distribution.cdf(&[k]);
    let mut a = if lo.is_finite() { lo.ceil() } else { 0.0 };
    let mut b = if hi.is_finite() { hi.floor() } else { a.max(1.0) };
    let mut step = 1.0;
    for _ in 0..config.max_bracket_expansions {
        if cdf(b)? >= level {
            break;
        }
        a = b;
        b += step;
        step *= 2.0;
    }
    if !lo.is_finite() {
        step = 1.0;
        for _ in 0..config.max_bracket_expansions {
            if cdf(a)? < level {
                break;
            }
            b = a;
            a -= step;
            step *= 2.0;
        }
    }
    if cdf(a)? >= level {
        return Ok(a);
    }
    // Invariant: F(a) < level <= F(b).
    while b - a > 1.0 {
        let mid = (0.5 * (a + b)).floor();
        if cdf(mid)? >= level {
            b = mid;
        } else {
            a = mid;
        }
    }
    Ok(b)
}

/// Quantile at level `p` (or `1 - p` with `tail`).
///
/// For `d > 1` returns the point `x(s)` of the marginal-quantile curve with
/// `cdf(x(s)) = level`; `s` lies in `[level, (level + d - 1) / d]`.
pub fn compute_quantile<D: Distribution + ?Sized>(
    distribution: &D,
    p: f64,
    tail: bool,
    config: &SolverConfig,
) -> Result<Point> {
    check_probability(p)?;
    let level = if tail { 1.0 - p } else { p };
    let dim = distribution.dimension();
    if dim == 1 {
        return Ok(vec![univariate_quantile(distribution, level, config)?]);
    }
    let marginals = univariate_marginals(distribution)?;
    let curve = |s: f64| -> Result<Point> {
        marginals.iter().map(|m| Ok(m.quantile(s, false)?[0])).collect()
    };
    if level <= 0.0 || level >= 1.0 {
        return curve(level);
    }
    let upper = (level + dim as f64 - 1.0) / dim as f64;
    let s = solve_monotone(|s| Ok(distribution.cdf(&curve(s)?)? - level), level, upper, config)?;
    curve(s)
}

/// Point `x(s) = (F_i^{-1}(1 - s))_i` with `survival(x(s)) = p`.
pub fn compute_inverse_survival<D: Distribution + ?Sized>(
    distribution: &D,
    p: f64,
    config: &SolverConfig,
) -> Result<Point> {
    check_probability(p)?;
    let dim = distribution.dimension();
    if dim == 1 {
        return Ok(vec![univariate_quantile(distribution, 1.0 - p, config)?]);
    }
    let marginals = univariate_marginals(distribution)?;
    let curve = |s: f64| -> Result<Point> {
        marginals.iter().map(|m| Ok(m.inverse_survival(s)?[0])).collect()
    };
    if p <= 0.0 || p >= 1.0 {
        return curve(p);
    }
    let upper = (p + dim as f64 - 1.0) / dim as f64;
    let s = solve_monotone(|s| Ok(distribution.survival(&curve(s)?)? - p), p, upper, config)?;
    curve(s)
}

/// `P(X > x)` by inclusion-exclusion over the CDFs of all marginal subsets.
pub(crate) fn survival_by_inclusion_exclusion<D: Distribution + ?Sized>(
    distribution: &D,
    x: &[f64],
) -> Result<f64> {
    let dim = distribution.dimension();
    check_dimension(dim, x.len())?;
    let mut total = 1.0;
    for mask in 1u32..(1u32 << dim) {
        let indices: Vec<usize> = (0..dim).filter(|i| mask & (1 << i) != 0).collect();
        let point: Vec<f64> = indices.iter().map(|&i| x[i]).collect();
        let value = if indices.len() == dim {
            distribution.cdf(x)?
        } else {
            distribution.marginal_distinct(&indices)?.cdf(&point)?
        };
        if indices.len() % 2 == 1 {
            total -= value;
        } else {
            total += value;
        }
    }
    Ok(total.clamp(0.0, 1.0))
}

/// Probability that `X` falls in the closed box `interval`.
pub fn interval_probability<D: Distribution + ?Sized>(distribution: &D, interval: &Interval) -> Result<f64> {
    let dim = distribution.dimension();
    check_dimension(dim, interval.dimension())?;
    let range = distribution.range();
    let lower: Vec<f64> = (0..dim).map(|i| interval.lower()[i].max(range.lower()[i])).collect();
    let upper: Vec<f64> = (0..dim).map(|i| interval.upper()[i].min(range.upper()[i])).collect();
    if (0..dim).any(|i| lower[i] > upper[i]) {
        return Ok(0.0);
    }
    if dim == 1 {
        let mut p = distribution.cdf(&upper)? - distribution.cdf(&lower)?;
        if !distribution.is_continuous() {
            // Closed on the left: add the atom at the lower bound.
            p += distribution.pdf(&lower)?;
        }
        return Ok(p.clamp(0.0, 1.0));
    }
    let mut total = 0.0;
    let mut corner = vec![0.0; dim];
    for mask in 0u32..(1u32 << dim) {
        let mut lower_count = 0;
        for i in 0..dim {
            if mask & (1 << i) != 0 {
                corner[i] = upper[i];
            } else {
                corner[i] = lower[i];
                lower_count += 1;
            }
        }
        if corner.iter().any(|&c| c == f64::NEG_INFINITY) {
            continue;
        }
        let value = distribution.cdf(&corner)?;
        if lower_count % 2 == 0 {
            total += value;
        } else {
            total -= value;
        }
    }
    Ok(total.clamp(0.0, 1.0))
}

/// Narrowest univariate interval `[F^{-1}(t), F^{-1}(t + alpha)]`.
fn univariate_minimum_volume(distribution: &dyn Distribution, alpha: f64) -> Result<Interval> {
    if alpha >= 1.0 {
        return Ok(distribution.range());
    }
    if distribution.is_elliptical() {
        return univariate_bilateral(distribution, alpha);
    }
    let q = |t: f64| -> Result<f64> { Ok(distribution.quantile(t.clamp(0.0, 1.0), false)?[0]) };
    let width = |t: f64| -> Result<f64> { Ok(q(t + alpha)? - q(t)?) };

    let (mut a, mut b) = (0.0, 1.0 - alpha);
    let mut c = b - INV_PHI * (b - a);
    let mut d = a + INV_PHI * (b - a);
    let mut wc = width(c)?;
    let mut wd = width(d)?;
    while b - a > GOLDEN_TOL {
        if wc <= wd {
            b = d;
            d = c;
            wd = wc;
            c = b - INV_PHI * (b - a);
            wc = width(c)?;
        } else {
            a = c;
            c = d;
            wc = wd;
            d = a + INV_PHI * (b - a);
            wd = width(d)?;
        }
    }
    // The search never evaluates the end points; compare them explicitly for
    // one-sided supports where the optimum sits on the boundary.
    let mut best = (0.5 * (a + b), width(0.5 * (a + b))?);
    for t in [0.0, 1.0 - alpha] {
        let w = width(t)?;
        if w < best.1 {
            best = (t, w);
        }
    }
    Interval::scalar(q(best.0)?, q(best.0 + alpha)?)
}

/// Central univariate interval `[F^{-1}((1-alpha)/2), F^{-1}((1+alpha)/2)]`.
fn univariate_bilateral(distribution: &dyn Distribution, alpha: f64) -> Result<Interval> {
    let half = 0.5 * (1.0 - alpha);
    let lo = distribution.quantile(half, false)?[0];
    let hi = distribution.quantile(half, true)?[0];
    Interval::scalar(lo, hi)
}

/// One-sided univariate interval holding `alpha`.
fn univariate_unilateral(distribution: &dyn Distribution, alpha: f64, upper_tail: bool) -> Result<Interval> {
    let range = distribution.range();
    if upper_tail {
        Interval::scalar(distribution.quantile(alpha, true)?[0], range.upper()[0])
    } else {
        Interval::scalar(range.lower()[0], distribution.quantile(alpha, false)?[0])
    }
}

/// Product box of marginal intervals at a common level `α`, with `α` tuned so
/// the box holds probability `p`. Returns `(box, α)`.
fn marginal_box_search<D, F>(distribution: &D, p: f64, config: &SolverConfig, build: F) -> Result<(Interval, f64)>
where
    D: Distribution + ?Sized,
    F: Fn(&dyn Distribution, f64) -> Result<Interval>,
{
    check_probability(p)?;
    let marginals = univariate_marginals(distribution)?;
    let box_at = |alpha: f64| -> Result<Interval> {
        let parts = marginals.iter().map(|m| build(m.as_ref(), alpha)).collect::<Result<Vec<_>>>()?;
        Ok(Interval::product(&parts))
    };
    let dim = distribution.dimension();
    if dim == 1 || p <= 0.0 || p >= 1.0 {
        return Ok((box_at(p)?, p));
    }
    if distribution.has_independent_copula() {
        let alpha = p.powf(1.0 / dim as f64);
        return Ok((box_at(alpha)?, alpha));
    }
    // P(box) <= alpha and P(box) >= 1 - d (1 - alpha).
    let upper = 1.0 - (1.0 - p) / dim as f64;
    let alpha = solve_monotone(
        |alpha| Ok(interval_probability(distribution, &box_at(alpha)?)? - p),
        p,
        upper,
        config,
    )?;
    log::debug!("marginal box search: p={p}, alpha={alpha}");
    Ok((box_at(alpha)?, alpha))
}

/// Minimum-volume interval holding probability `p`; returns `(interval, α)`
/// where `α` is the common marginal probability.
pub fn minimum_volume_interval<D: Distribution + ?Sized>(
    distribution: &D,
    p: f64,
    config: &SolverConfig,
) -> Result<(Interval, f64)> {
    marginal_box_search(distribution, p, config, univariate_minimum_volume)
}

/// Bilateral confidence box holding probability `p`; returns `(interval, α)`.
pub fn bilateral_confidence_interval<D: Distribution + ?Sized>(
    distribution: &D,
    p: f64,
    config: &SolverConfig,
) -> Result<(Interval, f64)> {
    marginal_box_search(distribution, p, config, univariate_bilateral)
}

/// Unilateral confidence box holding probability `p`.
///
/// `upper_tail = false` bounds each coordinate from above (`(lower, F^{-1}(α)]`),
/// `upper_tail = true` bounds it from below (`[F^{-1}(1-α), upper)`).
pub fn unilateral_confidence_interval<D: Distribution + ?Sized>(
    distribution: &D,
    p: f64,
    upper_tail: bool,
    config: &SolverConfig,
) -> Result<(Interval, f64)> {
    marginal_box_search(distribution, p, config, |m, alpha| univariate_unilateral(m, alpha, upper_tail))
}

/// Density level set `{x : pdf(x) >= threshold}`.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSet {
    dimension: usize,
    log_threshold: f64,
}

impl LevelSet {
    /// Dimension of the ambient space.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Density threshold `β`.
    pub fn threshold(&self) -> f64 {
        self.log_threshold.exp()
    }

    /// Whether `point` belongs to the level set of `distribution`.
    pub fn contains<D: Distribution + ?Sized>(&self, distribution: &D, point: &[f64]) -> Result<bool> {
        check_dimension(self.dimension, distribution.dimension())?;
        check_dimension(self.dimension, point.len())?;
        Ok(distribution.log_pdf(point)? >= self.log_threshold)
    }
}

/// Smallest-volume density level set holding probability `p`; returns `(set, β)`.
///
/// The enclosed probability of `{pdf >= β}` is estimated on a seeded Monte
/// Carlo reference sample, so `β` is the empirical `(1 - p)` quantile of the
/// sampled density values.
pub fn minimum_volume_level_set<D: Distribution + ?Sized>(
    distribution: &D,
    p: f64,
    monte_carlo: &MonteCarloConfig,
) -> Result<(LevelSet, f64)> {
    check_probability(p)?;
    if monte_carlo.size == 0 {
        return Err(Error::Validation("Monte Carlo size must be >= 1".into()));
    }
    let dimension = distribution.dimension();
    if p >= 1.0 {
        return Ok((LevelSet { dimension, log_threshold: f64::NEG_INFINITY }, 0.0));
    }
    let mut rng = RandomStream::new(monte_carlo.seed);
    let sample = distribution.sample(monte_carlo.size, &mut rng)?;
    let mut values = sample.iter().map(|x| distribution.log_pdf(x)).collect::<Result<Vec<_>>>()?;
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    // Keep the ceil(p n) largest density values.
    let keep = ((p * n as f64).ceil() as usize).clamp(1, n);
    let log_threshold = values[n - keep];
    log::debug!("level set: p={p}, kept {keep}/{n} reference points, log beta={log_threshold}");
    Ok((LevelSet { dimension, log_threshold }, log_threshold.exp()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copula::{ClaytonCopula, IndependentCopula};
    use crate::normal::{Normal, standard_pdf, standard_quantile};
    use crate::weibull::WeibullMin;
    use crate::zipf_mandelbrot::ZipfMandelbrot;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn cfg() -> SolverConfig {
        SolverConfig::default()
    }

    #[test]
    fn test_generic_univariate_quantile_matches_closed_form() {
        let w = WeibullMin::new(1.5, 0.7, 2.0).unwrap();
        for p in [1e-6, 0.2, 0.5, 0.9, 1.0 - 1e-9] {
            let generic = compute_quantile(&w, p, false, &cfg()).unwrap()[0];
            let closed = w.quantile(p, false).unwrap()[0];
            assert_relative_eq!(generic, closed, max_relative = 1e-6, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_generic_discrete_quantile() {
        let z = ZipfMandelbrot::new(15, 1.2, 2.0).unwrap();
        let generic = compute_quantile(&z, 0.95, false, &cfg()).unwrap();
        assert_eq!(generic, z.quantile(0.95, false).unwrap());
    }

    #[test]
    fn test_multivariate_quantile_on_curve() {
        let r = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 1.0]);
        let n = Normal::multivariate(vec![0.0, 1.0], vec![1.0, 2.0], r).unwrap();
        let q = n.quantile(0.9, false).unwrap();
        assert_relative_eq!(n.cdf(&q).unwrap(), 0.9, epsilon = 1e-6);
        // Both coordinates sit at the same marginal level.
        let s0 = (q[0] - 0.0) / 1.0;
        let s1 = (q[1] - 1.0) / 2.0;
        assert_relative_eq!(s0, s1, epsilon = 1e-9);
        let t = n.quantile(0.1, true).unwrap();
        assert_relative_eq!(t[0], q[0], epsilon = 1e-9);
    }

    #[test]
    fn test_inverse_survival_multivariate() {
        let c = ClaytonCopula::new(2.0).unwrap();
        let x = c.inverse_survival(0.3).unwrap();
        assert_relative_eq!(c.survival(&x).unwrap(), 0.3, epsilon = 1e-6);
        assert_relative_eq!(x[0], x[1], epsilon = 1e-12);
    }

    #[test]
    fn test_survival_inclusion_exclusion_matches_closed_form() {
        let c = IndependentCopula::new(3).unwrap();
        let x = [0.2, 0.5, 0.7];
        let generic = survival_by_inclusion_exclusion(&c, &x).unwrap();
        assert_relative_eq!(generic, c.survival(&x).unwrap(), epsilon = 1e-14);
    }

    #[test]
    fn test_interval_probability() {
        let n = Normal::independent(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        let z = standard_quantile(0.975);
        let b = Interval::new(vec![-z, -z], vec![z, z]).unwrap();
        assert_relative_eq!(interval_probability(&n, &b).unwrap(), 0.95 * 0.95, epsilon = 1e-12);
        let all = Interval::unbounded(2);
        assert_relative_eq!(interval_probability(&n, &all).unwrap(), 1.0, epsilon = 1e-14);
        let z = ZipfMandelbrot::new(15, 1.2, 2.0).unwrap();
        let atom = Interval::scalar(3.0, 3.0).unwrap();
        assert_relative_eq!(interval_probability(&z, &atom).unwrap(), z.pdf(&[3.0]).unwrap(), epsilon = 1e-15);
    }

    #[test]
    fn test_minimum_volume_interval_univariate() {
        let n = Normal::new(1.0, 2.0).unwrap();
        let (i, alpha) = minimum_volume_interval(&n, 0.95, &cfg()).unwrap();
        assert_eq!(alpha, 0.95);
        assert_relative_eq!(i.lower()[0], 1.0 - 2.0 * 1.959_963_984_540_054, epsilon = 1e-9);
        // Skewed law: narrowest interval starts at the lower tail.
        let w = WeibullMin::new(1.0, 1.0, 0.0).unwrap();
        let (i, _) = minimum_volume_interval(&w, 0.9, &cfg()).unwrap();
        assert_relative_eq!(i.lower()[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(i.upper()[0], 10f64.ln(), epsilon = 1e-5);
    }

    #[test]
    fn test_minimum_volume_interval_multivariate() {
        let r = DMatrix::from_row_slice(2, 2, &[1.0, 0.6, 0.6, 1.0]);
        let n = Normal::multivariate(vec![0.0, 0.0], vec![1.0, 1.0], r).unwrap();
        let (b, alpha) = minimum_volume_interval(&n, 0.9, &cfg()).unwrap();
        assert!(alpha > 0.9 && alpha < 0.95);
        assert_relative_eq!(interval_probability(&n, &b).unwrap(), 0.9, epsilon = 1e-6);
        let (b, alpha) = bilateral_confidence_interval(&IndependentCopula::new(2).unwrap(), 0.81, &cfg()).unwrap();
        assert_relative_eq!(alpha, 0.9, epsilon = 1e-12);
        assert_relative_eq!(b.lower()[0], 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_unilateral() {
        let n = Normal::new(0.0, 1.0).unwrap();
        let (lower_bounded, _) = unilateral_confidence_interval(&n, 0.95, true, &cfg()).unwrap();
        assert_eq!(lower_bounded.upper()[0], f64::INFINITY);
        assert_relative_eq!(lower_bounded.lower()[0], -1.644_853_626_951_472_2, epsilon = 1e-9);
        let (upper_bounded, _) = unilateral_confidence_interval(&n, 0.95, false, &cfg()).unwrap();
        assert_eq!(upper_bounded.lower()[0], f64::NEG_INFINITY);
        assert_relative_eq!(upper_bounded.upper()[0], 1.644_853_626_951_472_2, epsilon = 1e-9);
    }

    #[test]
    fn test_level_set_normal() {
        let n = Normal::new(0.0, 1.0).unwrap();
        let mc = MonteCarloConfig { size: 20_000, seed: 3 };
        let (set, beta) = minimum_volume_level_set(&n, 0.95, &mc).unwrap();
        let exact = standard_pdf(1.959_963_984_540_054);
        assert_relative_eq!(beta, exact, max_relative = 0.1);
        assert!(set.contains(&n, &[0.0]).unwrap());
        assert!(!set.contains(&n, &[3.0]).unwrap());
        let (again, _) = minimum_volume_level_set(&n, 0.95, &mc).unwrap();
        assert_eq!(set, again);
    }
}
