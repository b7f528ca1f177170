//! Common data types for StochKit

use crate::{Error, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// A point of `R^d`, stored as a plain vector of coordinates.
pub type Point = Vec<f64>;

/// Ordered collection of points sharing one dimension.
///
/// Storage is row-major: point `i` occupies `data[i*d..(i+1)*d]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    dimension: usize,
    data: Vec<f64>,
}

impl Sample {
    /// Create an empty sample of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension, data: Vec::new() }
    }

    /// Create an empty sample with room for `size` points.
    pub fn with_capacity(dimension: usize, size: usize) -> Self {
        Self { dimension, data: Vec::with_capacity(dimension * size) }
    }

    /// Build a sample from a row-major buffer.
    pub fn from_flat(dimension: usize, data: Vec<f64>) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Validation("sample dimension must be >= 1".into()));
        }
        if data.len() % dimension != 0 {
            return Err(Error::Validation(format!(
                "buffer length {} is not a multiple of dimension {}",
                data.len(),
                dimension
            )));
        }
        Ok(Self { dimension, data })
    }

    /// Build a sample from a list of points. All points must share one dimension.
    pub fn from_points(points: &[Point]) -> Result<Self> {
        let dimension = points
            .first()
            .map(|p| p.len())
            .ok_or_else(|| Error::DegenerateInput("cannot infer dimension of an empty point list".into()))?;
        let mut out = Self::with_capacity(dimension, points.len());
        for p in points {
            out.push(p)?;
        }
        Ok(out)
    }

    /// Build a univariate sample from scalar observations.
    pub fn from_column(values: &[f64]) -> Self {
        Self { dimension: 1, data: values.to_vec() }
    }

    /// Append one point.
    pub fn push(&mut self, point: &[f64]) -> Result<()> {
        crate::check_dimension(self.dimension, point.len())?;
        self.data.extend_from_slice(point);
        Ok(())
    }

    /// Number of points.
    pub fn size(&self) -> usize {
        if self.dimension == 0 { 0 } else { self.data.len() / self.dimension }
    }

    /// Dimension of the points.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// `true` if the sample holds no point.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Point `i` as a slice. Panics if out of bounds, like slice indexing.
    pub fn point(&self, i: usize) -> &[f64] {
        &self.data[i * self.dimension..(i + 1) * self.dimension]
    }

    /// Iterate over the points.
    pub fn iter(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.data.chunks_exact(self.dimension.max(1))
    }

    /// Raw row-major buffer.
    pub fn as_flat(&self) -> &[f64] {
        &self.data
    }

    /// Copy of coordinate `j` of every point.
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.iter().map(|p| p[j]).collect()
    }

    /// Sub-sample made of the given coordinates (in the given order, duplicates allowed).
    pub fn marginal(&self, indices: &[usize]) -> Result<Sample> {
        if indices.is_empty() {
            return Err(Error::Validation("marginal requires at least one index".into()));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.dimension) {
            return Err(Error::Validation(format!(
                "marginal index {bad} out of range for dimension {}",
                self.dimension
            )));
        }
        let mut out = Sample::with_capacity(indices.len(), self.size());
        for p in self.iter() {
            out.data.extend(indices.iter().map(|&i| p[i]));
        }
        Ok(out)
    }

    /// Component-wise minimum.
    pub fn min(&self) -> Point {
        self.fold_columns(f64::INFINITY, f64::min)
    }

    /// Component-wise maximum.
    pub fn max(&self) -> Point {
        self.fold_columns(f64::NEG_INFINITY, f64::max)
    }

    fn fold_columns(&self, init: f64, f: impl Fn(f64, f64) -> f64) -> Point {
        let mut acc = vec![init; self.dimension];
        for p in self.iter() {
            for (a, &x) in acc.iter_mut().zip(p) {
                *a = f(*a, x);
            }
        }
        acc
    }

    /// Empirical mean. Empty samples yield NaN coordinates.
    pub fn compute_mean(&self) -> Point {
        let n = self.size();
        let mut mean = vec![0.0; self.dimension];
        for p in self.iter() {
            for (m, &x) in mean.iter_mut().zip(p) {
                *m += x;
            }
        }
        let inv_n = 1.0 / n as f64;
        mean.iter_mut().for_each(|m| *m *= inv_n);
        mean
    }

    /// Unbiased empirical covariance (`n - 1` normalisation).
    ///
    /// Samples with fewer than two points yield a zero matrix.
    pub fn compute_covariance(&self) -> DMatrix<f64> {
        let d = self.dimension;
        let n = self.size();
        let mut cov = DMatrix::zeros(d, d);
        if n < 2 {
            return cov;
        }
        let mean = self.compute_mean();
        for p in self.iter() {
            for i in 0..d {
                let di = p[i] - mean[i];
                for j in 0..=i {
                    cov[(i, j)] += di * (p[j] - mean[j]);
                }
            }
        }
        let inv = 1.0 / (n as f64 - 1.0);
        for i in 0..d {
            for j in 0..=i {
                let v = cov[(i, j)] * inv;
                cov[(i, j)] = v;
                cov[(j, i)] = v;
            }
        }
        cov
    }

    /// Square root of the covariance diagonal.
    pub fn compute_standard_deviation(&self) -> Point {
        let cov = self.compute_covariance();
        (0..self.dimension).map(|i| cov[(i, i)].max(0.0).sqrt()).collect()
    }

    /// Pearson correlation matrix. Constant columns get a unit diagonal and zero
    /// off-diagonal entries.
    pub fn compute_pearson_correlation(&self) -> DMatrix<f64> {
        let cov = self.compute_covariance();
        let d = self.dimension;
        let sd: Vec<f64> = (0..d).map(|i| cov[(i, i)].max(0.0).sqrt()).collect();
        DMatrix::from_fn(d, d, |i, j| {
            if i == j {
                1.0
            } else if sd[i] > 0.0 && sd[j] > 0.0 {
                (cov[(i, j)] / (sd[i] * sd[j])).clamp(-1.0, 1.0)
            } else {
                0.0
            }
        })
    }

    /// Per-component sample skewness `m3 / m2^{3/2}` (central moments, `1/n`).
    pub fn compute_skewness(&self) -> Point {
        self.standardized_central_moment(3)
    }

    /// Per-component sample kurtosis `m4 / m2^2` (not excess: 3 for a Gaussian).
    pub fn compute_kurtosis(&self) -> Point {
        self.standardized_central_moment(4)
    }

    fn standardized_central_moment(&self, order: i32) -> Point {
        let n = self.size() as f64;
        let mean = self.compute_mean();
        (0..self.dimension)
            .map(|j| {
                let (mut m2, mut mk) = (0.0, 0.0);
                for p in self.iter() {
                    let dx = p[j] - mean[j];
                    m2 += dx * dx;
                    mk += dx.powi(order);
                }
                m2 /= n;
                mk /= n;
                if m2 > 0.0 { mk / m2.powf(order as f64 / 2.0) } else { 0.0 }
            })
            .collect()
    }

    /// Kendall's tau-b matrix. Pairs of columns without any untied pair get 0.
    ///
    /// Quadratic in the sample size.
    pub fn compute_kendall_tau(&self) -> DMatrix<f64> {
        let d = self.dimension;
        let n = self.size();
        let mut tau = DMatrix::identity(d, d);
        for a in 0..d {
            for b in (a + 1)..d {
                let (mut concordant, mut discordant) = (0i64, 0i64);
                let (mut ties_a, mut ties_b) = (0i64, 0i64);
                for i in 0..n {
                    let pi = self.point(i);
                    for j in (i + 1)..n {
                        let pj = self.point(j);
                        let da = pi[a] - pj[a];
                        let db = pi[b] - pj[b];
                        if da == 0.0 {
                            ties_a += 1;
                        }
                        if db == 0.0 {
                            ties_b += 1;
                        }
                        if da == 0.0 || db == 0.0 {
                            continue;
                        }
                        if (da > 0.0) == (db > 0.0) {
                            concordant += 1;
                        } else {
                            discordant += 1;
                        }
                    }
                }
                let n0 = (n as i64) * (n as i64 - 1) / 2;
                let denom = (((n0 - ties_a) as f64) * ((n0 - ties_b) as f64)).sqrt();
                let t = if denom > 0.0 { (concordant - discordant) as f64 / denom } else { 0.0 };
                tau[(a, b)] = t;
                tau[(b, a)] = t;
            }
        }
        tau
    }

    /// Pseudo-observations `rank / (n + 1)` per component, average ranks for ties.
    pub fn rank_transform(&self) -> Sample {
        let n = self.size();
        let d = self.dimension;
        let mut out = Sample { dimension: d, data: vec![0.0; n * d] };
        let scale = 1.0 / (n as f64 + 1.0);
        let mut order: Vec<usize> = (0..n).collect();
        for j in 0..d {
            order.sort_by(|&a, &b| self.data[a * d + j].total_cmp(&self.data[b * d + j]));
            let mut start = 0;
            while start < n {
                let value = self.data[order[start] * d + j];
                let mut end = start + 1;
                while end < n && self.data[order[end] * d + j] == value {
                    end += 1;
                }
                // ranks start..end (0-based) share the mean rank, 1-based
                let rank = 0.5 * ((start + 1) + end) as f64;
                for &idx in &order[start..end] {
                    out.data[idx * d + j] = rank * scale;
                }
                start = end;
            }
        }
        out
    }
}

/// Axis-aligned box `[lower, upper]` in `R^d`. Bounds may be infinite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    lower: Point,
    upper: Point,
}

impl Interval {
    /// Create a box; bounds must share one dimension and satisfy `lower <= upper`.
    pub fn new(lower: Point, upper: Point) -> Result<Self> {
        crate::check_dimension(lower.len(), upper.len())?;
        if let Some(i) = (0..lower.len()).find(|&i| !(lower[i] <= upper[i])) {
            return Err(Error::Validation(format!(
                "interval bound {i} is reversed: [{}, {}]",
                lower[i], upper[i]
            )));
        }
        Ok(Self { lower, upper })
    }

    /// Univariate interval `[lower, upper]`.
    pub fn scalar(lower: f64, upper: f64) -> Result<Self> {
        Self::new(vec![lower], vec![upper])
    }

    /// The whole of `R^d`.
    pub fn unbounded(dimension: usize) -> Self {
        Self { lower: vec![f64::NEG_INFINITY; dimension], upper: vec![f64::INFINITY; dimension] }
    }

    /// The unit hypercube `[0, 1]^d`.
    pub fn unit(dimension: usize) -> Self {
        Self { lower: vec![0.0; dimension], upper: vec![1.0; dimension] }
    }

    /// Cartesian product of univariate intervals.
    pub fn product(parts: &[Interval]) -> Self {
        let lower = parts.iter().flat_map(|p| p.lower.iter().copied()).collect();
        let upper = parts.iter().flat_map(|p| p.upper.iter().copied()).collect();
        Self { lower, upper }
    }

    /// Dimension of the box.
    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    /// Lower corner.
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// Upper corner.
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Sub-box over the given coordinates (order preserved, duplicates allowed).
    pub fn marginal(&self, indices: &[usize]) -> Self {
        Self {
            lower: indices.iter().map(|&i| self.lower[i]).collect(),
            upper: indices.iter().map(|&i| self.upper[i]).collect(),
        }
    }

    /// `true` if `point` lies in the closed box.
    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.dimension()
            && point.iter().zip(self.lower.iter().zip(&self.upper)).all(|(&x, (&lo, &hi))| lo <= x && x <= hi)
    }

    /// Per-axis widths.
    pub fn widths(&self) -> Point {
        self.lower.iter().zip(&self.upper).map(|(lo, hi)| hi - lo).collect()
    }

    /// Lebesgue measure of the box.
    pub fn volume(&self) -> f64 {
        self.widths().iter().product()
    }
}

/// Fit result containing parameter estimates and uncertainties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    /// Best-fit parameter values
    pub parameters: Vec<f64>,

    /// Parameter uncertainties (sqrt of covariance diagonal)
    pub uncertainties: Vec<f64>,

    /// Covariance matrix (row-major, N×N). `None` if Hessian inversion failed.
    pub covariance: Option<Vec<f64>>,

    /// Negative log-likelihood at minimum
    pub nll: f64,

    /// Convergence status
    pub converged: bool,

    /// Number of optimizer iterations
    pub n_iter: usize,

    /// Optimizer termination message
    pub message: String,
}

impl FitResult {
    /// Create a new fit result
    pub fn new(
        parameters: Vec<f64>,
        uncertainties: Vec<f64>,
        nll: f64,
        converged: bool,
        n_iter: usize,
    ) -> Self {
        Self { parameters, uncertainties, covariance: None, nll, converged, n_iter, message: String::new() }
    }

    /// Attach a row-major covariance matrix.
    pub fn with_covariance(mut self, covariance: Vec<f64>) -> Self {
        self.covariance = Some(covariance);
        self
    }

    /// Attach the optimizer termination message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Get correlation matrix element (i, j). Returns `None` if covariance is unavailable.
    pub fn correlation(&self, i: usize, j: usize) -> Option<f64> {
        let cov = self.covariance.as_ref()?;
        let n = self.parameters.len();
        if i >= n || j >= n {
            return None;
        }
        let sigma_i = self.uncertainties[i];
        let sigma_j = self.uncertainties[j];
        if sigma_i <= 0.0 || sigma_j <= 0.0 {
            return None;
        }
        Some(cov[i * n + j] / (sigma_i * sigma_j))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn small_sample() -> Sample {
        Sample::from_points(&[vec![1.0, 2.0], vec![2.0, 4.1], vec![3.0, 5.9], vec![4.0, 8.0]]).unwrap()
    }

    #[test]
    fn test_sample_layout() {
        let s = small_sample();
        assert_eq!(s.size(), 4);
        assert_eq!(s.dimension(), 2);
        assert_eq!(s.point(2), &[3.0, 5.9]);
        assert_eq!(s.column(0), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_push_rejects_wrong_dimension() {
        let mut s = Sample::new(2);
        assert!(matches!(s.push(&[1.0]), Err(Error::DimensionMismatch { expected: 2, got: 1 })));
    }

    #[test]
    fn test_mean_and_covariance() {
        let s = small_sample();
        let mean = s.compute_mean();
        assert_relative_eq!(mean[0], 2.5, epsilon = 1e-12);
        assert_relative_eq!(mean[1], 5.0, epsilon = 1e-12);
        let cov = s.compute_covariance();
        // var(1,2,3,4) with n-1 = 5/3
        assert_relative_eq!(cov[(0, 0)], 5.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(cov[(0, 1)], cov[(1, 0)], epsilon = 1e-15);
    }

    #[test]
    fn test_kendall_tau_perfect_concordance() {
        let s = small_sample();
        let tau = s.compute_kendall_tau();
        assert_relative_eq!(tau[(0, 1)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kendall_tau_all_ties_is_zero() {
        let s = Sample::from_points(&[vec![1.0, 1.0], vec![1.0, 1.0], vec![1.0, 1.0]]).unwrap();
        assert_eq!(s.compute_kendall_tau()[(0, 1)], 0.0);
    }

    #[test]
    fn test_rank_transform_ties() {
        let s = Sample::from_column(&[3.0, 1.0, 3.0]);
        let r = s.rank_transform();
        // ranks: 2.5, 1, 2.5 over n+1 = 4
        assert_relative_eq!(r.point(0)[0], 2.5 / 4.0);
        assert_relative_eq!(r.point(1)[0], 0.25);
        assert_relative_eq!(r.point(2)[0], 2.5 / 4.0);
    }

    #[test]
    fn test_marginal_reorders() {
        let s = small_sample();
        let m = s.marginal(&[1, 0, 1]).unwrap();
        assert_eq!(m.dimension(), 3);
        assert_eq!(m.point(0), &[2.0, 1.0, 2.0]);
        assert!(s.marginal(&[2]).is_err());
    }

    #[test]
    fn test_interval() {
        let i = Interval::new(vec![0.0, -1.0], vec![2.0, 1.0]).unwrap();
        assert!(i.contains(&[1.0, 0.0]));
        assert!(!i.contains(&[3.0, 0.0]));
        assert_relative_eq!(i.volume(), 4.0);
        assert!(Interval::new(vec![1.0], vec![0.0]).is_err());
        assert!(Interval::unbounded(2).contains(&[1e300, -1e300]));
    }

    #[test]
    fn test_fit_result() {
        let result = FitResult::new(vec![1.0, 2.0], vec![0.1, 0.2], 123.45, true, 100)
            .with_covariance(vec![0.01, 0.01, 0.01, 0.04]);
        assert_eq!(result.parameters.len(), 2);
        assert!(result.converged);
        assert_relative_eq!(result.correlation(0, 1).unwrap(), 0.5, epsilon = 1e-12);
    }
}
