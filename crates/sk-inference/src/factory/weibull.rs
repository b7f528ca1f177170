//! Weibull factories.
//!
//! The location is placed just below the sample minimum, then scale and shape
//! are fitted by maximum likelihood on the shifted data. `WeibullMax` is fitted
//! as the `WeibullMin` of the mirrored sample.

use std::sync::Arc;

use sk_core::{LogDensityModel, Result, Sample};
use sk_prob::{DistributionRef, WeibullMax, WeibullMin};
use statrs::function::gamma::gamma;

use super::{DEGENERATE_SCALE, DistributionFactory, check_parameter_count, check_sample, extremes};
use crate::mle::MaximumLikelihoodEstimator;

/// Negative log-likelihood of `W(beta, alpha)` on positive data, parameters `(beta, alpha)`.
struct WeibullLikelihood {
    data: Vec<f64>,
    init: [f64; 2],
}

impl LogDensityModel for WeibullLikelihood {
    fn dim(&self) -> usize {
        2
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["beta".into(), "alpha".into()]
    }

    fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        vec![(0.0, f64::INFINITY); 2]
    }

    fn parameter_init(&self) -> Vec<f64> {
        self.init.to_vec()
    }

    fn nll(&self, params: &[f64]) -> Result<f64> {
        let (beta, alpha) = (params[0], params[1]);
        // Line-search trial points may overflow the exponential map.
        if !(beta.is_finite() && alpha.is_finite() && beta > 0.0 && alpha > 0.0) {
            return Ok(f64::INFINITY);
        }
        let mut nll = 0.0;
        for &x in &self.data {
            nll -= sk_prob::weibull::logpdf(x, alpha, beta)?;
        }
        Ok(nll)
    }

    fn grad_nll(&self, params: &[f64]) -> Result<Vec<f64>> {
        let (beta, alpha) = (params[0], params[1]);
        let (mut g_beta, mut g_alpha) = (0.0, 0.0);
        for &x in &self.data {
            let log_t = (x / beta).ln();
            let t_alpha = (alpha * log_t).exp();
            g_beta -= alpha / beta * (t_alpha - 1.0);
            g_alpha -= 1.0 / alpha + log_t * (1.0 - t_alpha);
        }
        Ok(vec![g_beta, g_alpha])
    }
}

/// `(beta, alpha, gamma)` for the lower-tail Weibull fit of `values`.
fn fit_weibull_min(values: &[f64], estimator: &MaximumLikelihoodEstimator) -> Result<(f64, f64, f64)> {
    let n = values.len();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if n < 2 || range <= 0.0 {
        log::debug!("Weibull factory: sample with zero spread at {min}");
        return Ok((DEGENERATE_SCALE, 1.0, min));
    }
    let location = min - range / (n as f64 + 2.0);
    let data: Vec<f64> = values.iter().map(|x| x - location).collect();

    // Moment-based start.
    let mean = data.iter().sum::<f64>() / n as f64;
    let var = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    let alpha0 = (var.sqrt() / mean).powf(-1.086).clamp(1e-2, 1e2);
    let beta0 = mean / gamma(1.0 + 1.0 / alpha0);

    let model = WeibullLikelihood { data, init: [beta0, alpha0] };
    let fit = estimator.fit_minimum(&model)?;
    if !fit.converged {
        log::warn!("Weibull factory: likelihood maximisation did not converge ({})", fit.message);
    }
    Ok((fit.parameters[0], fit.parameters[1], location))
}

/// Factory of [`WeibullMin`] laws.
#[derive(Debug, Clone, Default)]
pub struct WeibullMinFactory {
    estimator: MaximumLikelihoodEstimator,
}

impl WeibullMinFactory {
    /// Create the factory with the default optimizer settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the factory with a custom estimator.
    pub fn with_estimator(estimator: MaximumLikelihoodEstimator) -> Self {
        Self { estimator }
    }

    /// Estimate a [`WeibullMin`] from a univariate `sample`.
    pub fn build_as_weibull_min(&self, sample: &Sample) -> Result<WeibullMin> {
        check_sample(sample, Some(1), "WeibullMin")?;
        let (beta, alpha, gamma) = fit_weibull_min(sample.as_flat(), &self.estimator)?;
        WeibullMin::new(beta, alpha, gamma)
    }
}

impl DistributionFactory for WeibullMinFactory {
    fn name(&self) -> &'static str {
        "WeibullMin"
    }

    fn build_from_sample(&self, sample: &Sample) -> Result<DistributionRef> {
        Ok(Arc::new(self.build_as_weibull_min(sample)?))
    }

    fn build_default(&self) -> Result<DistributionRef> {
        Ok(Arc::new(WeibullMin::new(1.0, 1.0, 0.0)?))
    }

    fn build_from_parameters(&self, parameters: &[f64]) -> Result<DistributionRef> {
        check_parameter_count(parameters, 3, "WeibullMin")?;
        Ok(Arc::new(WeibullMin::new(parameters[0], parameters[1], parameters[2])?))
    }
}

/// Factory of [`WeibullMax`] laws.
#[derive(Debug, Clone, Default)]
pub struct WeibullMaxFactory {
    estimator: MaximumLikelihoodEstimator,
}

impl WeibullMaxFactory {
    /// Create the factory with the default optimizer settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the factory with a custom estimator.
    pub fn with_estimator(estimator: MaximumLikelihoodEstimator) -> Self {
        Self { estimator }
    }

    /// Estimate a [`WeibullMax`] from a univariate `sample`.
    pub fn build_as_weibull_max(&self, sample: &Sample) -> Result<WeibullMax> {
        check_sample(sample, Some(1), "WeibullMax")?;
        let (min, max) = extremes(sample);
        if max - min <= 0.0 {
            log::debug!("Weibull factory: sample with zero spread at {max}");
            return WeibullMax::new(DEGENERATE_SCALE, 1.0, max);
        }
        let mirrored: Vec<f64> = sample.as_flat().iter().map(|x| -x).collect();
        let (beta, alpha, gamma) = fit_weibull_min(&mirrored, &self.estimator)?;
        WeibullMax::new(beta, alpha, -gamma)
    }
}

impl DistributionFactory for WeibullMaxFactory {
    fn name(&self) -> &'static str {
        "WeibullMax"
    }

    fn build_from_sample(&self, sample: &Sample) -> Result<DistributionRef> {
        Ok(Arc::new(self.build_as_weibull_max(sample)?))
    }

    fn build_default(&self) -> Result<DistributionRef> {
        Ok(Arc::new(WeibullMax::new(1.0, 1.0, 0.0)?))
    }

    fn build_from_parameters(&self, parameters: &[f64]) -> Result<DistributionRef> {
        check_parameter_count(parameters, 3, "WeibullMax")?;
        Ok(Arc::new(WeibullMax::new(parameters[0], parameters[1], parameters[2])?))
    }
}
