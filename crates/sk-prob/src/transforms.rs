//! Bijections between unconstrained coordinates and bounded parameters.
//!
//! Estimators optimise in the unconstrained space `z ∈ R^n` and map back to
//! distribution parameters `theta` (scales, shapes, correlations) through these
//! transforms.

use crate::math::sigmoid;

/// A bijection from unconstrained `z` to a constrained parameter `theta`.
pub trait Bijector: Send + Sync {
    /// `theta = forward(z)`.
    fn forward(&self, z: f64) -> f64;
    /// `z = inverse(theta)`.
    fn inverse(&self, theta: f64) -> f64;
    /// `dtheta/dz`.
    fn jacobian(&self, z: f64) -> f64;
}

/// `(-inf, inf) -> (-inf, inf)`.
pub struct IdentityBijector;

impl Bijector for IdentityBijector {
    #[inline]
    fn forward(&self, z: f64) -> f64 {
        z
    }
    #[inline]
    fn inverse(&self, theta: f64) -> f64 {
        theta
    }
    #[inline]
    fn jacobian(&self, _z: f64) -> f64 {
        1.0
    }
}

/// `(-inf, inf) -> (a, inf)`, `theta = a + exp(z)`.
pub struct LowerBoundedBijector {
    lower: f64,
}

impl LowerBoundedBijector {
    /// Bijector onto `(lower, inf)`.
    pub fn new(lower: f64) -> Self {
        Self { lower }
    }
}

impl Bijector for LowerBoundedBijector {
    #[inline]
    fn forward(&self, z: f64) -> f64 {
        self.lower + z.exp()
    }
    #[inline]
    fn inverse(&self, theta: f64) -> f64 {
        // Clamped so points on the bound stay finite.
        (theta - self.lower).max(1e-300).ln()
    }
    #[inline]
    fn jacobian(&self, z: f64) -> f64 {
        z.exp()
    }
}

/// `(-inf, inf) -> (-inf, b)`, `theta = b - exp(z)`.
pub struct UpperBoundedBijector {
    upper: f64,
}

impl UpperBoundedBijector {
    /// Bijector onto `(-inf, upper)`.
    pub fn new(upper: f64) -> Self {
        Self { upper }
    }
}

impl Bijector for UpperBoundedBijector {
    #[inline]
    fn forward(&self, z: f64) -> f64 {
        self.upper - z.exp()
    }
    #[inline]
    fn inverse(&self, theta: f64) -> f64 {
        (self.upper - theta).max(1e-300).ln()
    }
    #[inline]
    fn jacobian(&self, z: f64) -> f64 {
        -z.exp()
    }
}

/// `(-inf, inf) -> (a, b)`, `theta = a + (b - a) sigmoid(z)`.
pub struct SigmoidBijector {
    lower: f64,
    width: f64,
}

impl SigmoidBijector {
    /// Bijector onto `(lower, upper)`.
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, width: upper - lower }
    }
}

impl Bijector for SigmoidBijector {
    #[inline]
    fn forward(&self, z: f64) -> f64 {
        self.lower + self.width * sigmoid(z)
    }
    #[inline]
    fn inverse(&self, theta: f64) -> f64 {
        let p = ((theta - self.lower) / self.width).clamp(1e-15, 1.0 - 1e-15);
        (p / (1.0 - p)).ln()
    }
    #[inline]
    fn jacobian(&self, z: f64) -> f64 {
        let s = sigmoid(z);
        self.width * s * (1.0 - s)
    }
}

/// Per-coordinate transform of a parameter vector, selected from bounds.
pub struct ParameterTransform {
    bijectors: Vec<Box<dyn Bijector>>,
}

impl ParameterTransform {
    /// Selection:
    /// - `(-inf, inf)` -> identity
    /// - `(a, inf)` -> `a + exp(z)`
    /// - `(-inf, b)` -> `b - exp(z)`
    /// - `(a, b)` -> scaled sigmoid
    ///
    /// Degenerate bounds (`b <= a`, NaN) fall back to the identity.
    pub fn from_bounds(bounds: &[(f64, f64)]) -> Self {
        let bijectors = bounds
            .iter()
            .map(|&(lo, hi)| -> Box<dyn Bijector> {
                match (lo.is_finite(), hi.is_finite()) {
                    (true, true) if hi > lo => Box::new(SigmoidBijector::new(lo, hi)),
                    (true, false) if hi == f64::INFINITY => Box::new(LowerBoundedBijector::new(lo)),
                    (false, true) if lo == f64::NEG_INFINITY => Box::new(UpperBoundedBijector::new(hi)),
                    _ => Box::new(IdentityBijector),
                }
            })
            .collect();
        Self { bijectors }
    }

    /// Number of transformed coordinates.
    pub fn dim(&self) -> usize {
        self.bijectors.len()
    }

    /// Unconstrained -> constrained.
    pub fn forward(&self, z: &[f64]) -> Vec<f64> {
        z.iter().zip(&self.bijectors).map(|(&zi, b)| b.forward(zi)).collect()
    }

    /// Constrained -> unconstrained.
    pub fn inverse(&self, theta: &[f64]) -> Vec<f64> {
        theta.iter().zip(&self.bijectors).map(|(&ti, b)| b.inverse(ti)).collect()
    }

    /// `dtheta_i/dz_i` for each coordinate.
    pub fn jacobian_diag(&self, z: &[f64]) -> Vec<f64> {
        z.iter().zip(&self.bijectors).map(|(&zi, b)| b.jacobian(zi)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn check_roundtrip(b: &dyn Bijector, zs: &[f64], tol: f64) {
        for &z in zs {
            let back = b.inverse(b.forward(z));
            assert!((z - back).abs() / z.abs().max(1.0) < tol, "z={z}, back={back}");
        }
    }

    fn check_jacobian(b: &dyn Bijector, zs: &[f64]) {
        let eps = 1e-6;
        for &z in zs {
            let fd = (b.forward(z + eps) - b.forward(z - eps)) / (2.0 * eps);
            assert_relative_eq!(b.jacobian(z), fd, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_bijectors() {
        let zs = [-3.0, -0.5, 0.0, 1.2, 4.0];
        let all: [Box<dyn Bijector>; 4] = [
            Box::new(IdentityBijector),
            Box::new(LowerBoundedBijector::new(2.0)),
            Box::new(UpperBoundedBijector::new(-1.0)),
            Box::new(SigmoidBijector::new(-1.0, 1.0)),
        ];
        for b in &all {
            check_roundtrip(b.as_ref(), &zs, 1e-12);
            check_jacobian(b.as_ref(), &zs);
        }
    }

    #[test]
    fn test_from_bounds_respects_bounds() {
        let t = ParameterTransform::from_bounds(&[
            (f64::NEG_INFINITY, f64::INFINITY),
            (0.0, f64::INFINITY),
            (f64::NEG_INFINITY, 3.0),
            (-1.0, 1.0),
            (1.0, 1.0),
        ]);
        assert_eq!(t.dim(), 5);
        let theta = t.forward(&[-50.0, -50.0, -50.0, -50.0, 7.0]);
        assert_eq!(theta[0], -50.0);
        assert!(theta[1] > 0.0);
        assert!(theta[2] < 3.0);
        assert!(theta[3] >= -1.0 && theta[3] < 1.0);
        assert_eq!(theta[4], 7.0);
        let z = t.inverse(&[0.3, 2.0, 1.0, 0.5, 7.0]);
        let back = t.forward(&z);
        for (a, b) in back.iter().zip([0.3, 2.0, 1.0, 0.5, 7.0]) {
            assert_relative_eq!(*a, b, epsilon = 1e-12);
        }
    }
}
