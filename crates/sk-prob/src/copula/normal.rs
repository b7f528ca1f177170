use std::f64::consts::PI;
use std::sync::Arc;

use nalgebra::DMatrix;
use sk_core::{Interval, Point, Result, check_dimension, check_probability};

use super::{UNIFORM_KURTOSIS, UNIFORM_MEAN, UNIFORM_VARIANCE, check_conditioning, in_open_cube};
use crate::distribution::{Distribution, DistributionRef};
use crate::marginal::check_indices;
use crate::mvn;
use crate::normal::{correlation_cholesky, forward_substitution, standard_cdf, standard_pdf, standard_quantile};
use crate::rng::RandomStream;

/// Gaussian copula with correlation matrix `R`.
#[derive(Debug, Clone)]
pub struct NormalCopula {
    correlation: DMatrix<f64>,
    cholesky: DMatrix<f64>,
    log_det_correlation: f64,
    independent: bool,
}

impl NormalCopula {
    /// Create the copula of `N(0, R)`; `R` must be a valid correlation matrix.
    pub fn new(correlation: DMatrix<f64>) -> Result<Self> {
        let d = correlation.nrows();
        let cholesky = correlation_cholesky(&correlation, d)?;
        let log_det_correlation = 2.0 * (0..d).map(|i| cholesky[(i, i)].ln()).sum::<f64>();
        let independent = mvn::is_identity(&correlation);
        Ok(Self { correlation, cholesky, log_det_correlation, independent })
    }

    /// Correlation matrix of the underlying normal vector.
    pub fn correlation(&self) -> &DMatrix<f64> {
        &self.correlation
    }

    /// Normal scores `Phi^{-1}(u)` of a point.
    fn scores(u: &[f64]) -> Vec<f64> {
        u.iter().map(|&v| standard_quantile(v.clamp(0.0, 1.0))).collect()
    }

    fn conditional_moments(&self, y: &[f64]) -> Result<(f64, f64)> {
        check_conditioning(self.dimension(), y)?;
        let k = y.len();
        let eps = forward_substitution(&self.cholesky, &Self::scores(y));
        let m: f64 = (0..k).map(|j| self.cholesky[(k, j)] * eps[j]).sum();
        Ok((m, self.cholesky[(k, k)]))
    }
}

impl Distribution for NormalCopula {
    fn name(&self) -> &'static str {
        "NormalCopula"
    }

    fn dimension(&self) -> usize {
        self.correlation.nrows()
    }

    fn range(&self) -> Interval {
        Interval::unit(self.dimension())
    }

    fn parameters(&self) -> Vec<f64> {
        let d = self.dimension();
        (0..d).flat_map(|i| (0..i).map(move |j| (i, j))).map(|(i, j)| self.correlation[(i, j)]).collect()
    }

    fn parameter_names(&self) -> Vec<String> {
        let d = self.dimension();
        (0..d).flat_map(|i| (0..i).map(move |j| format!("R_{i}_{j}"))).collect()
    }

    fn pdf(&self, x: &[f64]) -> Result<f64> {
        Ok(self.log_pdf(x)?.exp())
    }

    fn log_pdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(self.dimension(), x.len())?;
        if !in_open_cube(x) {
            return Ok(f64::NEG_INFINITY);
        }
        let z = Self::scores(x);
        let w = forward_substitution(&self.cholesky, &z);
        let quad_r: f64 = w.iter().map(|v| v * v).sum();
        let quad_i: f64 = z.iter().map(|v| v * v).sum();
        Ok(-0.5 * (quad_r - quad_i) - 0.5 * self.log_det_correlation)
    }

    fn cdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(self.dimension(), x.len())?;
        Ok(mvn::orthant_cdf(&Self::scores(x), &self.correlation, &self.cholesky))
    }

    fn survival(&self, x: &[f64]) -> Result<f64> {
        check_dimension(self.dimension(), x.len())?;
        // P(U > u) = P(-Z <= -Phi^{-1}(u)) and -Z shares R.
        let z: Vec<f64> = Self::scores(x).into_iter().map(|v| -v).collect();
        Ok(mvn::orthant_cdf(&z, &self.correlation, &self.cholesky))
    }

    fn realization(&self, rng: &mut RandomStream) -> Result<Point> {
        let d = self.dimension();
        let eps: Vec<f64> = (0..d).map(|_| rng.standard_normal()).collect();
        Ok((0..d)
            .map(|i| standard_cdf((0..=i).map(|j| self.cholesky[(i, j)] * eps[j]).sum()))
            .collect())
    }

    fn mean(&self) -> Result<Point> {
        Ok(vec![UNIFORM_MEAN; self.dimension()])
    }

    fn covariance(&self) -> Result<DMatrix<f64>> {
        let d = self.dimension();
        // Cov(U_i, U_j) = rho_S / 12 with Spearman rho_S = 6/pi asin(r/2).
        Ok(DMatrix::from_fn(d, d, |i, j| {
            if i == j {
                UNIFORM_VARIANCE
            } else {
                (0.5 * self.correlation[(i, j)]).asin() / (2.0 * PI)
            }
        }))
    }

    fn skewness(&self) -> Result<Point> {
        Ok(vec![0.0; self.dimension()])
    }

    fn kurtosis(&self) -> Result<Point> {
        Ok(vec![UNIFORM_KURTOSIS; self.dimension()])
    }

    fn entropy(&self) -> Result<f64> {
        Ok(0.5 * self.log_det_correlation)
    }

    fn marginal_distinct(&self, indices: &[usize]) -> Result<DistributionRef> {
        check_indices(self.dimension(), indices)?;
        let k = indices.len();
        let r = DMatrix::from_fn(k, k, |a, b| self.correlation[(indices[a], indices[b])]);
        Ok(Arc::new(NormalCopula::new(r)?))
    }

    fn is_copula(&self) -> bool {
        true
    }

    fn has_elliptical_copula(&self) -> bool {
        true
    }

    fn has_independent_copula(&self) -> bool {
        self.independent
    }

    fn conditional_pdf(&self, x: f64, y: &[f64]) -> Result<f64> {
        let (m, s) = self.conditional_moments(y)?;
        if !(x > 0.0 && x < 1.0) {
            return Ok(0.0);
        }
        let z = standard_quantile(x);
        Ok(standard_pdf((z - m) / s) / (s * standard_pdf(z)))
    }

    fn conditional_cdf(&self, x: f64, y: &[f64]) -> Result<f64> {
        let (m, s) = self.conditional_moments(y)?;
        Ok(standard_cdf((standard_quantile(x.clamp(0.0, 1.0)) - m) / s))
    }

    fn conditional_quantile(&self, q: f64, y: &[f64]) -> Result<f64> {
        check_probability(q)?;
        let (m, s) = self.conditional_moments(y)?;
        Ok(standard_cdf(m + s * standard_quantile(q)))
    }
}
