//! End-to-end factory scenarios: sample from a known law, rebuild it, compare.

use std::sync::Arc;

use approx::assert_relative_eq;
use sk_core::{Error, Sample};
use sk_inference::{
    DistributionFactory, JointDistributionFactory, NormalCopulaFactory, NormalFactory, WeibullMaxFactory,
    WeibullMinFactory,
};
use sk_prob::{Distribution, JointDistribution, NormalCopula, RandomStream, WeibullMax};

#[test]
fn weibull_max_factory_scenario() {
    let truth = WeibullMax::new(1.0, 2.5, -1.0).unwrap();
    let sample = truth.sample(10_000, &mut RandomStream::new(0)).unwrap();
    let factory = WeibullMaxFactory::new();

    let estimated = factory.build_as_weibull_max(&sample).unwrap();
    assert!(estimated.gamma() > sample.max()[0]);
    // The location sits just above the sample maximum, which trails the true edge.
    assert_relative_eq!(estimated.gamma(), -1.0, epsilon = 0.05);
    assert_relative_eq!(estimated.beta(), 1.0, max_relative = 0.08);
    assert_relative_eq!(estimated.alpha(), 2.5, max_relative = 0.1);

    let as_trait = factory.build_from_sample(&sample).unwrap();
    assert_eq!(as_trait.parameters(), estimated.parameters());

    assert_eq!(factory.build_default().unwrap().parameters(), vec![1.0, 1.0, 0.0]);
    assert_eq!(factory.build_from_parameters(&truth.parameters()).unwrap().parameters(), truth.parameters());
}

#[test]
fn degenerate_samples_give_degenerate_laws() {
    let ones = Sample::from_column(&vec![1.0; 10_000]);
    let w = WeibullMaxFactory::new().build_as_weibull_max(&ones).unwrap();
    assert_relative_eq!(w.beta(), 0.0, epsilon = 1e-4);
    assert_relative_eq!(w.alpha(), 1.0, epsilon = 1e-6);
    assert_relative_eq!(w.gamma(), 1.0, epsilon = 1e-6);

    let zeros = Sample::from_column(&vec![0.0; 100]);
    let w = WeibullMinFactory::new().build_as_weibull_min(&zeros).unwrap();
    assert_relative_eq!(w.mean().unwrap()[0], 0.0, epsilon = 1e-4);
    let n = NormalFactory.build_from_sample(&zeros).unwrap();
    assert_relative_eq!(n.mean().unwrap()[0], 0.0, epsilon = 1e-12);
    assert!(n.standard_deviation().unwrap()[0] < 1e-4);
}

#[test]
fn empty_samples_are_rejected() {
    let empty = Sample::new(1);
    assert!(matches!(WeibullMaxFactory::new().build_from_sample(&empty), Err(Error::DegenerateInput(_))));
    assert!(matches!(NormalFactory.build_from_sample(&empty), Err(Error::DegenerateInput(_))));
}

#[test]
fn joint_factory_with_normal_copula() {
    let mut r = nalgebra::DMatrix::identity(2, 2);
    r[(0, 1)] = -0.5;
    r[(1, 0)] = -0.5;
    let truth = JointDistribution::new(
        vec![Arc::new(WeibullMax::new(1.0, 2.5, -1.0).unwrap()), Arc::new(sk_prob::Normal::new(3.0, 2.0).unwrap())],
        Arc::new(NormalCopula::new(r).unwrap()),
    )
    .unwrap();
    let sample = truth.sample(3_000, &mut RandomStream::new(17)).unwrap();

    let factory = JointDistributionFactory::new(
        vec![Arc::new(WeibullMaxFactory::new()), Arc::new(NormalFactory)],
        Arc::new(NormalCopulaFactory),
    )
    .unwrap();
    let fitted = factory.build_from_sample(&sample).unwrap();
    let p = fitted.parameters();
    // [beta, alpha, gamma, mu, sigma, rho]
    assert_eq!(p.len(), 6);
    assert_relative_eq!(p[3], 3.0, epsilon = 0.15);
    assert_relative_eq!(p[4], 2.0, max_relative = 0.05);
    assert_relative_eq!(p[5], -0.5, epsilon = 0.05);

    let rebuilt = factory.build_from_parameters(&p).unwrap();
    assert_eq!(rebuilt.parameters(), p);
}
