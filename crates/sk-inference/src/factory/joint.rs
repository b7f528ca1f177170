use std::sync::Arc;

use sk_core::{Error, Result, Sample};
use sk_prob::{DistributionRef, IndependentCopula, JointDistribution};

use super::{DistributionFactory, check_sample};

/// Composed-distribution estimator.
///
/// Each column is fitted by its own marginal factory. The copula factory sees
/// the pseudo-observations `rank / (n + 1)` of the whole sample; without one the
/// marginals are composed with the independent copula.
#[derive(Clone)]
pub struct JointDistributionFactory {
    marginals: Vec<Arc<dyn DistributionFactory>>,
    copula: Option<Arc<dyn DistributionFactory>>,
}

impl std::fmt::Debug for JointDistributionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.marginals.iter().map(|m| m.name()).collect();
        f.debug_struct("JointDistributionFactory")
            .field("marginals", &names)
            .field("copula", &self.copula.as_ref().map(|c| c.name()))
            .finish()
    }
}

impl JointDistributionFactory {
    /// Factory fitting `marginals` column by column and `copula` on ranks.
    pub fn new(marginals: Vec<Arc<dyn DistributionFactory>>, copula: Arc<dyn DistributionFactory>) -> Result<Self> {
        Self::validated(marginals, Some(copula))
    }

    /// Factory composing the fitted marginals with the independent copula.
    pub fn independent(marginals: Vec<Arc<dyn DistributionFactory>>) -> Result<Self> {
        Self::validated(marginals, None)
    }

    fn validated(
        marginals: Vec<Arc<dyn DistributionFactory>>,
        copula: Option<Arc<dyn DistributionFactory>>,
    ) -> Result<Self> {
        if marginals.is_empty() {
            return Err(Error::InvalidParameter("at least one marginal factory is required".into()));
        }
        Ok(Self { marginals, copula })
    }

    /// Number of marginals.
    pub fn dimension(&self) -> usize {
        self.marginals.len()
    }

    /// Estimate a [`JointDistribution`] from `sample`.
    pub fn build_as_joint(&self, sample: &Sample) -> Result<JointDistribution> {
        check_sample(sample, Some(self.dimension()), "JointDistribution")?;
        let marginals = self
            .marginals
            .iter()
            .enumerate()
            .map(|(i, factory)| factory.build_from_sample(&sample.marginal(&[i])?))
            .collect::<Result<Vec<_>>>()?;
        let copula: DistributionRef = match &self.copula {
            Some(factory) => factory.build_from_sample(&sample.rank_transform())?,
            None => Arc::new(IndependentCopula::new(self.dimension())?),
        };
        log::debug!(
            "JointDistribution factory: fitted {} marginals with a {} copula",
            marginals.len(),
            copula.name()
        );
        JointDistribution::new(marginals, copula)
    }

    /// Parameter count of each marginal family, read off its default member.
    fn marginal_parameter_counts(&self) -> Result<Vec<usize>> {
        self.marginals.iter().map(|m| Ok(m.build_default()?.parameters().len())).collect()
    }
}

impl DistributionFactory for JointDistributionFactory {
    fn name(&self) -> &'static str {
        "JointDistribution"
    }

    fn build_from_sample(&self, sample: &Sample) -> Result<DistributionRef> {
        Ok(Arc::new(self.build_as_joint(sample)?))
    }

    /// Default marginals composed with the independent copula.
    fn build_default(&self) -> Result<DistributionRef> {
        let marginals = self.marginals.iter().map(|m| m.build_default()).collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(JointDistribution::independent(marginals)?))
    }

    /// Marginal parameters in order, followed by the copula parameters.
    fn build_from_parameters(&self, parameters: &[f64]) -> Result<DistributionRef> {
        let counts = self.marginal_parameter_counts()?;
        let total: usize = counts.iter().sum();
        if parameters.len() < total {
            return Err(Error::InvalidParameter(format!(
                "JointDistribution expects at least {total} marginal parameters, got {}",
                parameters.len()
            )));
        }
        let mut offset = 0;
        let mut marginals = Vec::with_capacity(counts.len());
        for (factory, count) in self.marginals.iter().zip(&counts) {
            marginals.push(factory.build_from_parameters(&parameters[offset..offset + count])?);
            offset += count;
        }
        let rest = &parameters[offset..];
        let copula: DistributionRef = match &self.copula {
            Some(factory) => factory.build_from_parameters(rest)?,
            None if rest.is_empty() => Arc::new(IndependentCopula::new(self.dimension())?),
            None => {
                return Err(Error::InvalidParameter(format!(
                    "independent composition takes no copula parameters, got {}",
                    rest.len()
                )));
            }
        };
        Ok(Arc::new(JointDistribution::new(marginals, copula)?))
    }
}
