//! Distributions composed from univariate marginals and a copula.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use sk_core::{Error, Interval, Point, Result, check_dimension, check_probability};

use crate::conditional::{InverseIsoProbabilisticTransformation, IsoProbabilisticTransformation};
use crate::copula::{IndependentCopula, check_conditioning};
use crate::distribution::{Distribution, DistributionRef};
use crate::marginal::check_indices;
use crate::quadrature::{GaussLegendre, QuadratureConfig};
use crate::rng::RandomStream;

/// Probability mass cut from each tail when integrating Hoeffding's formula.
const HOEFFDING_TAIL: f64 = 1e-10;

/// `X_i = F_i^{-1}(U_i)` with `U` drawn from a copula.
#[derive(Debug, Clone)]
pub struct JointDistribution {
    marginals: Vec<DistributionRef>,
    copula: DistributionRef,
}

/// Compose univariate `marginals` with `copula`.
pub fn compose(marginals: Vec<DistributionRef>, copula: DistributionRef) -> Result<JointDistribution> {
    JointDistribution::new(marginals, copula)
}

impl JointDistribution {
    /// Build the composed law; marginals must be univariate and `copula` must
    /// be a copula of matching dimension.
    pub fn new(marginals: Vec<DistributionRef>, copula: DistributionRef) -> Result<Self> {
        if marginals.is_empty() {
            return Err(Error::InvalidParameter("at least one marginal is required".into()));
        }
        if let Some((i, m)) = marginals.iter().enumerate().find(|(_, m)| m.dimension() != 1) {
            return Err(Error::InvalidParameter(format!(
                "marginal {i} ({}) has dimension {}, expected 1",
                m.name(),
                m.dimension()
            )));
        }
        if !copula.is_copula() {
            return Err(Error::InvalidParameter(format!("{} is not a copula", copula.name())));
        }
        check_dimension(marginals.len(), copula.dimension())?;
        Ok(Self { marginals, copula })
    }

    /// Compose `marginals` with the independent copula.
    pub fn independent(marginals: Vec<DistributionRef>) -> Result<Self> {
        let copula = Arc::new(IndependentCopula::new(marginals.len())?);
        Self::new(marginals, copula)
    }

    /// Univariate marginals in coordinate order.
    pub fn marginals(&self) -> &[DistributionRef] {
        &self.marginals
    }

    /// Copula joining the marginals.
    pub fn copula(&self) -> &DistributionRef {
        &self.copula
    }

    /// Rosenblatt transformation of this law.
    pub fn iso_probabilistic_transformation(&self) -> IsoProbabilisticTransformation {
        IsoProbabilisticTransformation::new(Arc::new(self.clone()))
    }

    /// Inverse Rosenblatt transformation, from standard normal space back to `X`.
    pub fn inverse_iso_probabilistic_transformation(&self) -> InverseIsoProbabilisticTransformation {
        InverseIsoProbabilisticTransformation::new(Arc::new(self.clone()))
    }

    fn marginal_cdfs(&self, x: &[f64]) -> Result<Point> {
        self.marginals.iter().zip(x).map(|(m, &v)| m.cdf(&[v])).collect()
    }

    fn standard_deviation_marginals(&self) -> Result<Point> {
        self.marginals.iter().map(|m| Ok(m.standard_deviation()?[0])).collect()
    }

    fn marginal_quantiles(&self, u: &[f64]) -> Result<Point> {
        self.marginals.iter().zip(u).map(|(m, &v)| Ok(m.quantile(v, false)?[0])).collect()
    }

    /// `Cov(X_i, X_j) = ∬ C_ij(F_i(x), F_j(y)) - F_i(x) F_j(y) dx dy`.
    fn hoeffding_covariance(&self, i: usize, j: usize, config: &QuadratureConfig) -> Result<f64> {
        let pair = self.copula.marginal_distinct(&[i, j])?;
        let gl = GaussLegendre::new(config.nodes_per_panel);
        // Weights and marginal CDF values at the nodes of the truncated range.
        let nodes = |m: &DistributionRef| -> Result<(Vec<f64>, Vec<f64>)> {
            let a = m.quantile(HOEFFDING_TAIL, false)?[0];
            let b = m.quantile(HOEFFDING_TAIL, true)?[0];
            let (xs, ws) = gl.composite_nodes(a, b, config.panels);
            let fs = xs.iter().map(|&x| m.cdf(&[x])).collect::<Result<Vec<_>>>()?;
            Ok((ws, fs))
        };
        let (wx, fx) = nodes(&self.marginals[i])?;
        let (wy, fy) = nodes(&self.marginals[j])?;
        let mut acc = 0.0;
        for (a, u) in wx.iter().zip(&fx) {
            for (b, v) in wy.iter().zip(&fy) {
                acc += a * b * (pair.cdf(&[*u, *v])? - u * v);
            }
        }
        Ok(acc)
    }
}

impl Distribution for JointDistribution {
    fn name(&self) -> &'static str {
        "JointDistribution"
    }

    fn dimension(&self) -> usize {
        self.marginals.len()
    }

    fn range(&self) -> Interval {
        let parts: Vec<Interval> = self.marginals.iter().map(|m| m.range()).collect();
        Interval::product(&parts)
    }

    fn parameters(&self) -> Vec<f64> {
        self.marginals.iter().flat_map(|m| m.parameters()).chain(self.copula.parameters()).collect()
    }

    fn parameter_names(&self) -> Vec<String> {
        self.marginals
            .iter()
            .enumerate()
            .flat_map(|(i, m)| m.parameter_names().into_iter().map(move |n| format!("X{i}.{n}")))
            .chain(self.copula.parameter_names().into_iter().map(|n| format!("copula.{n}")))
            .collect()
    }

    fn pdf(&self, x: &[f64]) -> Result<f64> {
        Ok(self.log_pdf(x)?.exp())
    }

    fn log_pdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(self.dimension(), x.len())?;
        let mut total = 0.0;
        for (m, &v) in self.marginals.iter().zip(x) {
            total += m.log_pdf(&[v])?;
            if total == f64::NEG_INFINITY {
                return Ok(total);
            }
        }
        if self.copula.has_independent_copula() {
            return Ok(total);
        }
        Ok(total + self.copula.log_pdf(&self.marginal_cdfs(x)?)?)
    }

    fn cdf(&self, x: &[f64]) -> Result<f64> {
        check_dimension(self.dimension(), x.len())?;
        self.copula.cdf(&self.marginal_cdfs(x)?)
    }

    fn survival(&self, x: &[f64]) -> Result<f64> {
        check_dimension(self.dimension(), x.len())?;
        if self.dimension() == 1 {
            return self.marginals[0].complementary_cdf(x);
        }
        self.copula.survival(&self.marginal_cdfs(x)?)
    }

    fn realization(&self, rng: &mut RandomStream) -> Result<Point> {
        let u = self.copula.realization(rng)?;
        self.marginal_quantiles(&u)
    }

    fn mean(&self) -> Result<Point> {
        self.marginals.iter().map(|m| Ok(m.mean()?[0])).collect()
    }

    fn covariance(&self) -> Result<DMatrix<f64>> {
        let d = self.dimension();
        let sd = self.standard_deviation_marginals()?;
        let mut cov = DMatrix::from_diagonal(&DVector::from_iterator(d, sd.iter().map(|s| s * s)));
        if self.copula.has_independent_copula() {
            return Ok(cov);
        }
        let config = QuadratureConfig::default();
        for i in 0..d {
            for j in 0..i {
                let c = self.hoeffding_covariance(i, j, &config)?;
                cov[(i, j)] = c;
                cov[(j, i)] = c;
            }
        }
        Ok(cov)
    }

    fn standard_deviation(&self) -> Result<Point> {
        self.standard_deviation_marginals()
    }

    fn skewness(&self) -> Result<Point> {
        self.marginals.iter().map(|m| Ok(m.skewness()?[0])).collect()
    }

    fn kurtosis(&self) -> Result<Point> {
        self.marginals.iter().map(|m| Ok(m.kurtosis()?[0])).collect()
    }

    fn entropy(&self) -> Result<f64> {
        let marginal: f64 = self.marginals.iter().map(|m| m.entropy()).sum::<Result<f64>>()?;
        Ok(marginal + self.copula.entropy()?)
    }

    fn quantile(&self, p: f64, tail: bool) -> Result<Point> {
        check_probability(p)?;
        let u = self.copula.quantile(p, tail)?;
        self.marginal_quantiles(&u)
    }

    fn inverse_survival(&self, p: f64) -> Result<Point> {
        check_probability(p)?;
        let u = self.copula.inverse_survival(p)?;
        self.marginal_quantiles(&u)
    }

    fn marginal_distinct(&self, indices: &[usize]) -> Result<DistributionRef> {
        check_indices(self.dimension(), indices)?;
        if let [i] = indices {
            return Ok(self.marginals[*i].clone());
        }
        let marginals = indices.iter().map(|&i| self.marginals[i].clone()).collect();
        Ok(Arc::new(JointDistribution::new(marginals, self.copula.marginal_distinct(indices)?)?))
    }

    fn is_continuous(&self) -> bool {
        self.marginals.iter().all(|m| m.is_continuous())
    }

    fn is_elliptical(&self) -> bool {
        self.copula.has_elliptical_copula() && self.marginals.iter().all(|m| m.is_elliptical())
    }

    fn has_elliptical_copula(&self) -> bool {
        self.copula.has_elliptical_copula()
    }

    fn has_independent_copula(&self) -> bool {
        self.copula.has_independent_copula()
    }

    fn conditional_pdf(&self, x: f64, y: &[f64]) -> Result<f64> {
        check_conditioning(self.dimension(), y)?;
        let k = y.len();
        let f = self.marginals[k].pdf(&[x])?;
        if f == 0.0 {
            return Ok(0.0);
        }
        let u = self.marginals[k].cdf(&[x])?;
        Ok(f * self.copula.conditional_pdf(u, &self.marginal_cdfs(y)?)?)
    }

    fn conditional_cdf(&self, x: f64, y: &[f64]) -> Result<f64> {
        check_conditioning(self.dimension(), y)?;
        let u = self.marginals[y.len()].cdf(&[x])?;
        self.copula.conditional_cdf(u, &self.marginal_cdfs(y)?)
    }

    fn conditional_quantile(&self, q: f64, y: &[f64]) -> Result<f64> {
        check_conditioning(self.dimension(), y)?;
        check_probability(q)?;
        let u = self.copula.conditional_quantile(q, &self.marginal_cdfs(y)?)?;
        Ok(self.marginals[y.len()].quantile(u, false)?[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copula::{ClaytonCopula, NormalCopula};
    use crate::normal::Normal;
    use crate::uniform::Uniform;
    use approx::assert_relative_eq;

    fn normal_marginals() -> Vec<DistributionRef> {
        vec![Arc::new(Normal::new(1.0, 2.0).unwrap()), Arc::new(Normal::new(-1.0, 0.5).unwrap())]
    }

    fn gaussian_joint(rho: f64) -> JointDistribution {
        let r = DMatrix::from_row_slice(2, 2, &[1.0, rho, rho, 1.0]);
        JointDistribution::new(normal_marginals(), Arc::new(NormalCopula::new(r).unwrap())).unwrap()
    }

    #[test]
    fn test_validation() {
        let copula: DistributionRef = Arc::new(IndependentCopula::new(3).unwrap());
        assert!(matches!(
            JointDistribution::new(normal_marginals(), copula),
            Err(Error::DimensionMismatch { expected: 2, got: 3 })
        ));
        let not_copula: DistributionRef = Arc::new(Normal::independent(vec![0.0; 2], vec![1.0; 2]).unwrap());
        assert!(matches!(JointDistribution::new(normal_marginals(), not_copula), Err(Error::InvalidParameter(_))));
        let bivariate: DistributionRef = Arc::new(Normal::independent(vec![0.0; 2], vec![1.0; 2]).unwrap());
        assert!(JointDistribution::independent(vec![bivariate]).is_err());
        assert!(JointDistribution::independent(Vec::new()).is_err());
    }

    #[test]
    fn test_matches_multivariate_normal() {
        let joint = gaussian_joint(0.6);
        let r = DMatrix::from_row_slice(2, 2, &[1.0, 0.6, 0.6, 1.0]);
        let mvn = Normal::multivariate(vec![1.0, -1.0], vec![2.0, 0.5], r).unwrap();
        let x = [0.4, -0.8];
        assert_relative_eq!(joint.pdf(&x).unwrap(), mvn.pdf(&x).unwrap(), max_relative = 1e-10);
        assert_relative_eq!(joint.cdf(&x).unwrap(), mvn.cdf(&x).unwrap(), epsilon = 1e-10);
        let cov = joint.covariance().unwrap();
        assert_relative_eq!(cov[(0, 1)], 0.6 * 2.0 * 0.5, epsilon = 1e-4);
        assert_relative_eq!(cov[(1, 1)], 0.25, epsilon = 1e-14);
        assert_relative_eq!(joint.entropy().unwrap(), mvn.entropy().unwrap(), epsilon = 1e-12);
        assert_relative_eq!(
            joint.conditional_cdf(-0.7, &[2.0]).unwrap(),
            mvn.conditional_cdf(-0.7, &[2.0]).unwrap(),
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_independent_joint() {
        let joint = JointDistribution::independent(normal_marginals()).unwrap();
        assert!(joint.has_independent_copula());
        assert!(joint.is_elliptical());
        let cov = joint.covariance().unwrap();
        assert_eq!(cov[(0, 1)], 0.0);
        let q = joint.quantile(0.25, false).unwrap();
        assert_relative_eq!(joint.cdf(&q).unwrap(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_clayton_quantile_and_survival() {
        let marginals: Vec<DistributionRef> =
            vec![Arc::new(Uniform::new(0.0, 2.0).unwrap()), Arc::new(Normal::new(0.0, 1.0).unwrap())];
        let joint = compose(marginals, Arc::new(ClaytonCopula::new(2.0).unwrap())).unwrap();
        assert!(!joint.is_elliptical());
        let q = joint.quantile(0.4, false).unwrap();
        assert_relative_eq!(joint.cdf(&q).unwrap(), 0.4, epsilon = 1e-6);
        let s = joint.inverse_survival(0.4).unwrap();
        assert_relative_eq!(joint.survival(&s).unwrap(), 0.4, epsilon = 1e-6);
        let v = joint.conditional_quantile(0.7, &[0.5]).unwrap();
        assert_relative_eq!(joint.conditional_cdf(v, &[0.5]).unwrap(), 0.7, epsilon = 1e-10);
    }

    #[test]
    fn test_marginal_reorders_copula() {
        let joint = gaussian_joint(0.3);
        let first = joint.marginal(&[0]).unwrap();
        assert_eq!(first.name(), "Normal");
        let swapped = joint.marginal(&[1, 0]).unwrap();
        assert_relative_eq!(swapped.mean().unwrap()[0], -1.0);
        assert_relative_eq!(
            swapped.cdf(&[-0.8, 0.4]).unwrap(),
            joint.cdf(&[0.4, -0.8]).unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_marginal_distinct_rejects_out_of_range() {
        let joint = gaussian_joint(0.3);
        assert!(matches!(joint.marginal_distinct(&[2]), Err(Error::Validation(_))));
        assert!(matches!(joint.marginal_distinct(&[0, 4]), Err(Error::Validation(_))));
        assert!(matches!(joint.marginal_distinct(&[]), Err(Error::Validation(_))));
        assert_eq!(joint.marginal_distinct(&[1]).unwrap().dimension(), 1);
    }

    #[test]
    fn test_iso_transformation_roundtrip() {
        let joint = gaussian_joint(-0.4);
        let t = joint.iso_probabilistic_transformation();
        let x = [2.5, -1.2];
        let z = t.evaluate(&x).unwrap();
        assert_relative_eq!(z[0], 0.75, epsilon = 1e-12);
        let back = joint.inverse_iso_probabilistic_transformation().evaluate(&z).unwrap();
        assert_relative_eq!(back[0], x[0], epsilon = 1e-9);
        assert_relative_eq!(back[1], x[1], epsilon = 1e-9);
    }
}
