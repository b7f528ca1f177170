//! Marginal extraction, including repeated coordinates.

use std::sync::Arc;

use nalgebra::DMatrix;
use sk_core::{Error, Interval, Point, Result, check_dimension};

use crate::conditional;
use crate::copula::check_conditioning;
use crate::distribution::{Distribution, DistributionRef};
use crate::rng::RandomStream;
use crate::solver::SolverConfig;

/// Fail with [`Error::Validation`] on an empty selection or an index `>= dimension`.
pub(crate) fn check_indices(dimension: usize, indices: &[usize]) -> Result<()> {
    if indices.is_empty() {
        return Err(Error::Validation("marginal indices must not be empty".into()));
    }
    if let Some(&bad) = indices.iter().find(|&&i| i >= dimension) {
        return Err(Error::Validation(format!("marginal index {bad} out of range for dimension {dimension}")));
    }
    Ok(())
}

/// Validate `indices` against `dimension` and build the requested marginal.
///
/// Distinct indices delegate to [`Distribution::marginal_distinct`] (in the
/// given order); repeated indices yield a [`MarginalDistribution`] over the
/// distinct marginal.
pub(crate) fn extract<D: Distribution + ?Sized>(distribution: &D, indices: &[usize]) -> Result<DistributionRef> {
    check_indices(distribution.dimension(), indices)?;
    let mut distinct: Vec<usize> = Vec::with_capacity(indices.len());
    for &i in indices {
        if !distinct.contains(&i) {
            distinct.push(i);
        }
    }
    if distinct.len() == indices.len() {
        return distribution.marginal_distinct(indices);
    }
    let base = distribution.marginal_distinct(&distinct)?;
    let map = indices.iter().filter_map(|i| distinct.iter().position(|j| j == i)).collect();
    Ok(Arc::new(MarginalDistribution::new(base, map)?))
}

/// Law of `(X_{m_0}, ..., X_{m_{k-1}})` for a base vector `X` and an index map
/// that may repeat coordinates.
///
/// Repeated coordinates are almost surely equal, so the density is taken with
/// respect to the measure concentrated on the diagonal: it equals the base
/// density at the collapsed point and vanishes off the diagonal.
#[derive(Debug, Clone)]
pub struct MarginalDistribution {
    base: DistributionRef,
    map: Vec<usize>,
}

impl MarginalDistribution {
    /// Select coordinates `map` of `base`; duplicates are allowed and every
    /// base coordinate must appear at least once.
    pub fn new(base: DistributionRef, map: Vec<usize>) -> Result<Self> {
        let d = base.dimension();
        check_indices(d, &map)?;
        if let Some(missing) = (0..d).find(|i| !map.contains(i)) {
            return Err(Error::Validation(format!("base coordinate {missing} is not selected")));
        }
        Ok(Self { base, map })
    }

    /// Law the coordinates are drawn from.
    pub fn base(&self) -> &DistributionRef {
        &self.base
    }

    /// Selected base coordinates, repeats included.
    pub fn indices(&self) -> &[usize] {
        &self.map
    }

    fn has_duplicates(&self) -> bool {
        self.map.iter().enumerate().any(|(j, i)| self.map[..j].contains(i))
    }

    fn expand(&self, base_point: &[f64]) -> Point {
        self.map.iter().map(|&i| base_point[i]).collect()
    }

    /// Base point built from the coordinates of `x`; `None` off the diagonal.
    fn collapse_on_diagonal(&self, x: &[f64]) -> Result<Option<Point>> {
        check_dimension(self.map.len(), x.len())?;
        let mut y: Vec<Option<f64>> = vec![None; self.base.dimension()];
        for (&i, &v) in self.map.iter().zip(x) {
            match y[i] {
                Some(prev) if prev != v => return Ok(None),
                _ => y[i] = Some(v),
            }
        }
        Ok(y.into_iter().collect())
    }

    /// Base point reduced coordinatewise by `pick` over repeated entries.
    fn collapse_with(&self, x: &[f64], pick: fn(f64, f64) -> f64) -> Result<Point> {
        check_dimension(self.map.len(), x.len())?;
        let mut y = vec![None; self.base.dimension()];
        for (&i, &v) in self.map.iter().zip(x) {
            y[i] = Some(match y[i] {
                Some(prev) => pick(prev, v),
                None => v,
            });
        }
        y.into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::Computation("marginal map does not cover its base".into()))
    }

    /// Earlier position in the conditioning vector carrying the same base coordinate as `k`.
    fn earlier_copy(&self, k: usize) -> Option<usize> {
        self.map[..k].iter().position(|&i| i == self.map[k])
    }
}

impl Distribution for MarginalDistribution {
    fn name(&self) -> &'static str {
        "MarginalDistribution"
    }

    fn dimension(&self) -> usize {
        self.map.len()
    }

    fn range(&self) -> Interval {
        let r = self.base.range();
        let lower = self.map.iter().map(|&i| r.lower()[i]).collect();
        let upper = self.map.iter().map(|&i| r.upper()[i]).collect();
        Interval::new(lower, upper).unwrap_or_else(|_| Interval::unbounded(self.map.len()))
    }

    fn parameters(&self) -> Vec<f64> {
        self.base.parameters()
    }

    fn parameter_names(&self) -> Vec<String> {
        self.base.parameter_names()
    }

    fn pdf(&self, x: &[f64]) -> Result<f64> {
        match self.collapse_on_diagonal(x)? {
            Some(y) => self.base.pdf(&y),
            None => Ok(0.0),
        }
    }

    fn log_pdf(&self, x: &[f64]) -> Result<f64> {
        match self.collapse_on_diagonal(x)? {
            Some(y) => self.base.log_pdf(&y),
            None => Ok(f64::NEG_INFINITY),
        }
    }

    fn cdf(&self, x: &[f64]) -> Result<f64> {
        // {X_i <= a, X_i <= b} = {X_i <= min(a, b)}
        let y = self.collapse_with(x, f64::min)?;
        self.base.cdf(&y)
    }

    fn survival(&self, x: &[f64]) -> Result<f64> {
        let y = self.collapse_with(x, f64::max)?;
        self.base.survival(&y)
    }

    fn realization(&self, rng: &mut RandomStream) -> Result<Point> {
        Ok(self.expand(&self.base.realization(rng)?))
    }

    fn mean(&self) -> Result<Point> {
        Ok(self.expand(&self.base.mean()?))
    }

    fn covariance(&self) -> Result<DMatrix<f64>> {
        let c = self.base.covariance()?;
        let k = self.map.len();
        Ok(DMatrix::from_fn(k, k, |a, b| c[(self.map[a], self.map[b])]))
    }

    fn skewness(&self) -> Result<Point> {
        Ok(self.expand(&self.base.skewness()?))
    }

    fn kurtosis(&self) -> Result<Point> {
        Ok(self.expand(&self.base.kurtosis()?))
    }

    fn entropy(&self) -> Result<f64> {
        self.base.entropy()
    }

    fn quantile(&self, p: f64, tail: bool) -> Result<Point> {
        // Repeated coordinates share the marginal level on the quantile curve.
        Ok(self.expand(&self.base.quantile(p, tail)?))
    }

    fn inverse_survival(&self, p: f64) -> Result<Point> {
        Ok(self.expand(&self.base.inverse_survival(p)?))
    }

    fn marginal_distinct(&self, indices: &[usize]) -> Result<DistributionRef> {
        check_indices(self.dimension(), indices)?;
        let mapped: Vec<usize> = indices.iter().map(|&j| self.map[j]).collect();
        extract(self.base.as_ref(), &mapped)
    }

    fn is_continuous(&self) -> bool {
        self.base.is_continuous()
    }

    fn is_elliptical(&self) -> bool {
        self.base.is_elliptical()
    }

    fn is_copula(&self) -> bool {
        self.base.is_copula()
    }

    fn has_elliptical_copula(&self) -> bool {
        self.base.has_elliptical_copula()
    }

    fn has_independent_copula(&self) -> bool {
        self.map.len() == 1 || (!self.has_duplicates() && self.base.has_independent_copula())
    }

    fn conditional_pdf(&self, x: f64, y: &[f64]) -> Result<f64> {
        check_conditioning(self.dimension(), y)?;
        match self.earlier_copy(y.len()) {
            // Dirac mass at the earlier copy.
            Some(j) => Ok(if x == y[j] { f64::INFINITY } else { 0.0 }),
            None => conditional::generic_conditional_pdf(self, x, y),
        }
    }

    fn conditional_cdf(&self, x: f64, y: &[f64]) -> Result<f64> {
        check_conditioning(self.dimension(), y)?;
        match self.earlier_copy(y.len()) {
            Some(j) => Ok(if x >= y[j] { 1.0 } else { 0.0 }),
            None => conditional::generic_conditional_cdf(self, x, y),
        }
    }

    fn conditional_quantile(&self, q: f64, y: &[f64]) -> Result<f64> {
        check_conditioning(self.dimension(), y)?;
        match self.earlier_copy(y.len()) {
            Some(j) => Ok(y[j]),
            None => conditional::generic_conditional_quantile(self, q, y, &SolverConfig::default()),
        }
    }
}
