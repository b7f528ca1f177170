//! Scalar root finding used by quantile and interval searches.
//!
//! All entry points assume the target function is monotone on the search
//! interval; the solvers only rely on a sign change, never on smoothness.

use sk_core::{Error, Result};

/// Tolerances and iteration budgets for [`RootSolver`].
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Absolute tolerance on the abscissa.
    pub abs_tol: f64,
    /// Relative tolerance on the abscissa.
    pub rel_tol: f64,
    /// Stop as soon as `|f(x)|` falls below this value.
    pub res_tol: f64,
    /// Maximum number of solver iterations.
    pub max_iter: usize,
    /// Maximum number of step doublings while searching for a bracket.
    pub max_bracket_expansions: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            abs_tol: 1e-7,
            rel_tol: 1e-9,
            res_tol: 1e-12,
            max_iter: 200,
            max_bracket_expansions: 64,
        }
    }
}

/// Bracketing root solver (Brent's method and safeguarded Newton).
#[derive(Debug, Clone, Default)]
pub struct RootSolver {
    config: SolverConfig,
}

impl RootSolver {
    /// Create a solver with the given configuration.
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Solver configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn tolerance(&self, x: f64) -> f64 {
        self.config.abs_tol + self.config.rel_tol * x.abs()
    }

    /// Find `x` in `[lower, upper]` with `f(x) = 0`.
    ///
    /// `f(lower)` and `f(upper)` must have opposite signs (or one must vanish).
    pub fn solve<F>(&self, mut f: F, lower: f64, upper: f64) -> Result<f64>
    where
        F: FnMut(f64) -> Result<f64>,
    {
        if !(lower.is_finite() && upper.is_finite()) || lower > upper {
            return Err(Error::Validation(format!(
                "invalid root bracket [{lower}, {upper}]"
            )));
        }
        let mut a = lower;
        let mut b = upper;
        let mut fa = f(a)?;
        let mut fb = f(b)?;
        if fa == 0.0 {
            return Ok(a);
        }
        if fb == 0.0 {
            return Ok(b);
        }
        if fa.signum() == fb.signum() {
            return Err(Error::Computation(format!(
                "root not bracketed: f({a})={fa}, f({b})={fb}"
            )));
        }

        let mut c = b;
        let mut fc = fb;
        let mut d = b - a;
        let mut e = d;
        for _ in 0..self.config.max_iter {
            if fb.signum() == fc.signum() {
                c = a;
                fc = fa;
                d = b - a;
                e = d;
            }
            if fc.abs() < fb.abs() {
                a = b;
                b = c;
                c = a;
                fa = fb;
                fb = fc;
                fc = fa;
            }
            let tol = 2.0 * f64::EPSILON * b.abs() + 0.5 * self.tolerance(b);
            let xm = 0.5 * (c - b);
            if xm.abs() <= tol || fb == 0.0 || fb.abs() <= self.config.res_tol {
                return Ok(b);
            }
            if e.abs() >= tol && fa.abs() > fb.abs() {
                // Inverse quadratic interpolation, secant when only two points are known.
                let s = fb / fa;
                let (mut p, mut q) = if a == c {
                    (2.0 * xm * s, 1.0 - s)
                } else {
                    let qq = fa / fc;
                    let r = fb / fc;
                    (
                        s * (2.0 * xm * qq * (qq - r) - (b - a) * (r - 1.0)),
                        (qq - 1.0) * (r - 1.0) * (s - 1.0),
                    )
                };
                if p > 0.0 {
                    q = -q;
                }
                p = p.abs();
                let min1 = 3.0 * xm * q - (tol * q).abs();
                let min2 = (e * q).abs();
                if 2.0 * p < min1.min(min2) {
                    e = d;
                    d = p / q;
                } else {
                    d = xm;
                    e = d;
                }
            } else {
                d = xm;
                e = d;
            }
            a = b;
            fa = fb;
            b += if d.abs() > tol { d } else { tol.copysign(xm) };
            fb = f(b)?;
        }
        Err(Error::Convergence(format!(
            "root solver did not converge in {} iterations (last x={b})",
            self.config.max_iter
        )))
    }

    /// Newton iterations safeguarded by bisection on `[lower, upper]`.
    ///
    /// `f` returns the value and the derivative. Steps leaving the bracket, or
    /// with a vanishing derivative, fall back to bisection.
    pub fn solve_with_derivative<F>(
        &self,
        mut f: F,
        lower: f64,
        upper: f64,
        start: f64,
    ) -> Result<f64>
    where
        F: FnMut(f64) -> Result<(f64, f64)>,
    {
        if !(lower.is_finite() && upper.is_finite()) || lower > upper {
            return Err(Error::Validation(format!(
                "invalid root bracket [{lower}, {upper}]"
            )));
        }
        let (fl, _) = f(lower)?;
        let (fh, _) = f(upper)?;
        if fl == 0.0 {
            return Ok(lower);
        }
        if fh == 0.0 {
            return Ok(upper);
        }
        if fl.signum() == fh.signum() {
            return Err(Error::Computation(format!(
                "root not bracketed: f({lower})={fl}, f({upper})={fh}"
            )));
        }
        // Orient so that f(xl) < 0 < f(xh).
        let (mut xl, mut xh) = if fl < 0.0 { (lower, upper) } else { (upper, lower) };

        let mut rts = if start.is_finite() && start > lower && start < upper {
            start
        } else {
            0.5 * (lower + upper)
        };
        let mut dxold = (upper - lower).abs();
        let mut dx = dxold;
        let (mut fv, mut df) = f(rts)?;
        for _ in 0..self.config.max_iter {
            if fv == 0.0 || fv.abs() <= self.config.res_tol {
                return Ok(rts);
            }
            let newton_out = ((rts - xh) * df - fv) * ((rts - xl) * df - fv) > 0.0;
            let too_slow = (2.0 * fv).abs() > (dxold * df).abs();
            if !df.is_finite() || df == 0.0 || newton_out || too_slow {
                dxold = dx;
                dx = 0.5 * (xh - xl);
                rts = xl + dx;
                if rts == xl {
                    return Ok(rts);
                }
            } else {
                dxold = dx;
                dx = fv / df;
                let prev = rts;
                rts -= dx;
                if rts == prev {
                    return Ok(rts);
                }
            }
            if dx.abs() < self.tolerance(rts) {
                return Ok(rts);
            }
            (fv, df) = f(rts)?;
            if fv < 0.0 {
                xl = rts;
            } else {
                xh = rts;
            }
        }
        Err(Error::Convergence(format!(
            "Newton solver did not converge in {} iterations (last x={rts})",
            self.config.max_iter
        )))
    }

    /// Expand from `start` until a non-decreasing `f` changes sign.
    ///
    /// The search never leaves `[floor, ceiling]`; infinite limits allow
    /// unbounded expansion. Returns a finite bracket `(a, b)` with
    /// `f(a) <= 0 <= f(b)`.
    pub fn bracket<F>(
        &self,
        mut f: F,
        start: f64,
        step: f64,
        floor: f64,
        ceiling: f64,
    ) -> Result<(f64, f64)>
    where
        F: FnMut(f64) -> Result<f64>,
    {
        let mut step = if step.is_finite() && step > 0.0 { step } else { 1.0 };
        let f0 = f(start)?;
        if f0 == 0.0 {
            return Ok((start, start));
        }
        let upward = f0 < 0.0;
        let mut inner = start;
        for _ in 0..self.config.max_bracket_expansions {
            let mut outer = if upward { inner + step } else { inner - step };
            if upward && outer >= ceiling {
                outer = ceiling;
            }
            if !upward && outer <= floor {
                outer = floor;
            }
            if !outer.is_finite() {
                break;
            }
            let fo = f(outer)?;
            let crossed = if upward { fo >= 0.0 } else { fo <= 0.0 };
            if crossed {
                return Ok(if upward { (inner, outer) } else { (outer, inner) });
            }
            if outer == ceiling || outer == floor {
                break;
            }
            inner = outer;
            step *= 2.0;
        }
        Err(Error::Convergence(format!(
            "could not bracket a root starting from {start}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_brent_cubic() {
        let s = RootSolver::default();
        let x = s.solve(|x| Ok(x * x * x - 2.0), 0.0, 2.0).unwrap();
        assert_relative_eq!(x, 2f64.cbrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_brent_unbracketed() {
        let s = RootSolver::default();
        assert!(s.solve(|x| Ok(x * x + 1.0), -1.0, 1.0).is_err());
    }

    #[test]
    fn test_newton_matches_brent() {
        let s = RootSolver::default();
        let target = 0.3;
        let x = s
            .solve_with_derivative(|x: f64| Ok((x.tanh() - target, 1.0 - x.tanh().powi(2))), -5.0, 5.0, 4.9)
            .unwrap();
        assert_relative_eq!(x, target.atanh(), epsilon = 1e-9);
    }

    #[test]
    fn test_bracket_expands_both_ways() {
        let s = RootSolver::default();
        let (a, b) = s.bracket(|x| Ok(x - 1000.0), 0.0, 1.0, f64::NEG_INFINITY, f64::INFINITY).unwrap();
        assert!(a <= 1000.0 && b >= 1000.0);
        let (a, b) = s.bracket(|x| Ok(x + 37.5), 0.0, 1.0, f64::NEG_INFINITY, f64::INFINITY).unwrap();
        assert!(a <= -37.5 && b >= -37.5);
    }

    #[test]
    fn test_bracket_respects_floor() {
        let s = RootSolver::default();
        let (a, _) = s.bracket(|x| Ok(x - 1e-3), 5.0, 1.0, 0.0, f64::INFINITY).unwrap();
        assert_eq!(a, 0.0);
        assert!(s.bracket(|_| Ok(1.0), 5.0, 1.0, 0.0, 10.0).is_err());
    }
}
