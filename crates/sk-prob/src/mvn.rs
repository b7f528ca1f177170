//! Multivariate normal orthant probabilities.
//!
//! `P(Z <= z)` for a standard normal vector with correlation matrix `R`:
//! - d = 1: `Phi(z)`
//! - d = 2: Genz's bivariate algorithm (Drezner-Wesolowsky with Gauss-Legendre rules)
//! - d >= 3: Genz separation of variables integrated on a randomized
//!   Richtmyer lattice with fixed shifts, so results are deterministic.
//!
//! Infinite limits are allowed everywhere.

use std::f64::consts::PI;

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::normal::{standard_cdf, standard_quantile};

const GL6_W: [f64; 3] = [0.171_324_492_379_170_5, 0.360_761_573_048_138_4, 0.467_913_934_572_691_4];
const GL6_X: [f64; 3] = [0.932_469_514_203_152_2, 0.661_209_386_466_264_7, 0.238_619_186_083_197_0];
const GL12_W: [f64; 6] = [
    0.047_175_336_386_511_77,
    0.106_939_325_995_318_3,
    0.160_078_328_543_346_4,
    0.203_167_426_723_065_9,
    0.233_492_536_538_354_7,
    0.249_147_045_813_402_9,
];
const GL12_X: [f64; 6] = [
    0.981_560_634_246_719_1,
    0.904_117_256_370_475_0,
    0.769_902_674_194_305_0,
    0.587_317_954_286_617_1,
    0.367_831_498_998_180_2,
    0.125_233_408_511_469_2,
];
const GL20_W: [f64; 10] = [
    0.017_614_007_139_152_12,
    0.040_601_429_800_386_94,
    0.062_672_048_334_109_06,
    0.083_276_741_576_704_75,
    0.101_930_119_817_240_4,
    0.118_194_531_961_518_4,
    0.131_688_638_449_176_6,
    0.142_096_109_318_382_1,
    0.149_172_986_472_603_7,
    0.152_753_387_130_725_9,
];
const GL20_X: [f64; 10] = [
    0.993_128_599_185_094_9,
    0.963_971_927_277_913_8,
    0.912_234_428_251_325_9,
    0.839_116_971_822_218_8,
    0.746_331_906_460_150_8,
    0.636_053_680_726_515_0,
    0.510_867_001_950_827_1,
    0.373_706_088_715_419_6,
    0.227_785_851_141_645_1,
    0.076_526_521_133_497_33,
];

/// Lattice points per shift for the d >= 3 integrator.
const LATTICE_POINTS: usize = 2048;
/// Number of random shifts of the lattice.
const LATTICE_SHIFTS: usize = 8;
/// Fixed seed for the lattice shifts.
const LATTICE_SEED: u64 = 0x5eed_1a77;

/// Upper orthant `P(X > h, Y > k)` of a standard bivariate normal with correlation `r`.
pub fn bivariate_upper(h: f64, k: f64, r: f64) -> f64 {
    if h == f64::INFINITY || k == f64::INFINITY {
        return 0.0;
    }
    if h == f64::NEG_INFINITY {
        return if k == f64::NEG_INFINITY { 1.0 } else { standard_cdf(-k) };
    }
    if k == f64::NEG_INFINITY {
        return standard_cdf(-h);
    }
    if r == 0.0 {
        return standard_cdf(-h) * standard_cdf(-k);
    }
    let tp = 2.0 * PI;
    let (w_half, x_half): (&[f64], &[f64]) = if r.abs() < 0.3 {
        (&GL6_W, &GL6_X)
    } else if r.abs() < 0.75 {
        (&GL12_W, &GL12_X)
    } else {
        (&GL20_W, &GL20_X)
    };
    // Nodes on [0, 2]: 1 - x and 1 + x, both with weight w.
    let nodes = || {
        w_half
            .iter()
            .zip(x_half)
            .flat_map(|(&w, &x)| [(w, 1.0 - x), (w, 1.0 + x)])
    };

    let mut k = k;
    let mut hk = h * k;
    let mut bvn = 0.0;
    if r.abs() < 0.925 {
        let hs = 0.5 * (h * h + k * k);
        let asr = 0.5 * r.asin();
        for (w, x) in nodes() {
            let sn = (asr * x).sin();
            bvn += w * ((sn * hk - hs) / (1.0 - sn * sn)).exp();
        }
        bvn = bvn * asr / tp + standard_cdf(-h) * standard_cdf(-k);
    } else {
        if r < 0.0 {
            k = -k;
            hk = -hk;
        }
        if r.abs() < 1.0 {
            let as_ = 1.0 - r * r;
            let mut a = as_.sqrt();
            let bs = (h - k) * (h - k);
            let c = (4.0 - hk) / 8.0;
            let d = (12.0 - hk) / 80.0;
            let asr = -0.5 * (bs / as_ + hk);
            if asr > -100.0 {
                bvn = a * asr.exp() * (1.0 - c * (bs - as_) * (1.0 - d * bs) / 3.0 + c * d * as_ * as_);
            }
            if hk > -100.0 {
                let b = bs.sqrt();
                let sp = tp.sqrt() * standard_cdf(-b / a);
                bvn -= (-0.5 * hk).exp() * sp * b * (1.0 - c * bs * (1.0 - d * bs) / 3.0);
            }
            a *= 0.5;
            let mut acc = 0.0;
            for (w, x) in nodes() {
                let xs = (a * x) * (a * x);
                let asr = -0.5 * (bs / xs + hk);
                if asr > -100.0 {
                    let sp = 1.0 + c * xs * (1.0 + 5.0 * d * xs);
                    let rs = (1.0 - xs).sqrt();
                    let ep = (-0.5 * hk * xs / ((1.0 + rs) * (1.0 + rs))).exp() / rs;
                    acc += w * asr.exp() * (sp - ep);
                }
            }
            bvn = (a * acc - bvn) / tp;
        }
        if r > 0.0 {
            bvn += standard_cdf(-h.max(k));
        } else if h >= k {
            bvn = -bvn;
        } else {
            let l = if h < 0.0 {
                standard_cdf(k) - standard_cdf(h)
            } else {
                standard_cdf(-h) - standard_cdf(-k)
            };
            bvn = l - bvn;
        }
    }
    bvn.clamp(0.0, 1.0)
}

/// Lower orthant `P(X <= x, Y <= y)` of a standard bivariate normal.
pub fn bivariate_cdf(x: f64, y: f64, r: f64) -> f64 {
    bivariate_upper(-x, -y, r)
}

/// Lower orthant probability `P(Z <= z)` for a standard normal vector with
/// correlation `correlation` and its lower Cholesky factor `cholesky`.
pub fn orthant_cdf(z: &[f64], correlation: &DMatrix<f64>, cholesky: &DMatrix<f64>) -> f64 {
    let d = z.len();
    if z.iter().any(|&v| v == f64::NEG_INFINITY || v.is_nan()) {
        return 0.0;
    }
    match d {
        0 => 1.0,
        1 => standard_cdf(z[0]),
        2 => bivariate_cdf(z[0], z[1], correlation[(0, 1)]),
        _ => {
            if is_identity(correlation) {
                return z.iter().map(|&v| standard_cdf(v)).product();
            }
            // Drop coordinates at +inf: they do not constrain the orthant.
            let active: Vec<usize> = (0..d).filter(|&i| z[i] != f64::INFINITY).collect();
            if active.len() < d {
                let sub_r = DMatrix::from_fn(active.len(), active.len(), |i, j| {
                    correlation[(active[i], active[j])]
                });
                let sub_z: Vec<f64> = active.iter().map(|&i| z[i]).collect();
                return match sub_r.clone().cholesky() {
                    Some(ch) => orthant_cdf(&sub_z, &sub_r, &ch.l()),
                    None => 0.0,
                };
            }
            separation_of_variables(z, cholesky)
        }
    }
}

pub(crate) fn is_identity(m: &DMatrix<f64>) -> bool {
    let n = m.nrows();
    (0..n).all(|i| (0..n).all(|j| m[(i, j)] == if i == j { 1.0 } else { 0.0 }))
}

/// Genz separation-of-variables estimate for `d >= 3` (all limits finite).
fn separation_of_variables(z: &[f64], l: &DMatrix<f64>) -> f64 {
    let d = z.len();
    let dims = d - 1;
    let generators: Vec<f64> = first_primes(dims).into_iter().map(|p| (p as f64).sqrt().fract()).collect();
    let mut rng = StdRng::seed_from_u64(LATTICE_SEED);
    let mut w = vec![0.0; dims];
    let mut y = vec![0.0; d];
    let mut total = 0.0;
    for _ in 0..LATTICE_SHIFTS {
        let shift: Vec<f64> = (0..dims).map(|_| rng.gen::<f64>()).collect();
        let mut acc = 0.0;
        for n in 1..=LATTICE_POINTS {
            for j in 0..dims {
                let v = (n as f64 * generators[j] + shift[j]).fract();
                // Baker's tent transform improves lattice convergence on periodic-ised integrands.
                w[j] = 1.0 - (2.0 * v - 1.0).abs();
            }
            let mut anti = w.clone();
            anti.iter_mut().for_each(|v| *v = 1.0 - *v);
            acc += 0.5 * (sov_integrand(z, l, &w, &mut y) + sov_integrand(z, l, &anti, &mut y));
        }
        total += acc / LATTICE_POINTS as f64;
    }
    (total / LATTICE_SHIFTS as f64).clamp(0.0, 1.0)
}

fn sov_integrand(z: &[f64], l: &DMatrix<f64>, w: &[f64], y: &mut [f64]) -> f64 {
    let d = z.len();
    let mut e = standard_cdf(z[0] / l[(0, 0)]);
    let mut f = e;
    for i in 1..d {
        let u = (w[i - 1] * e).clamp(1e-300, 1.0 - 1e-16);
        y[i - 1] = standard_quantile(u);
        let s: f64 = (0..i).map(|j| l[(i, j)] * y[j]).sum();
        e = standard_cdf((z[i] - s) / l[(i, i)]);
        f *= e;
        if f == 0.0 {
            break;
        }
    }
    f
}

fn first_primes(n: usize) -> Vec<u64> {
    let mut primes = Vec::with_capacity(n);
    let mut candidate = 2u64;
    while primes.len() < n {
        if primes.iter().take_while(|&&p| p * p <= candidate).all(|&p| candidate % p != 0) {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bivariate_independent() {
        let p = bivariate_cdf(0.3, -0.7, 0.0);
        assert_relative_eq!(p, standard_cdf(0.3) * standard_cdf(-0.7), epsilon = 1e-15);
    }

    #[test]
    fn test_bivariate_origin_closed_form() {
        // P(X<=0, Y<=0) = 1/4 + asin(r)/(2 pi)
        for r in [-0.95, -0.5, 0.1, 0.5, 0.8, 0.95, 0.999] {
            let p = bivariate_cdf(0.0, 0.0, r);
            assert_relative_eq!(p, 0.25 + r.asin() / (2.0 * PI), epsilon = 1e-10);
        }
    }

    #[test]
    fn test_bivariate_limits() {
        assert_eq!(bivariate_cdf(f64::NEG_INFINITY, 1.0, 0.5), 0.0);
        assert_relative_eq!(bivariate_cdf(f64::INFINITY, 1.0, 0.5), standard_cdf(1.0), epsilon = 1e-15);
        assert_relative_eq!(bivariate_cdf(f64::INFINITY, f64::INFINITY, 0.5), 1.0);
    }

    #[test]
    fn test_bivariate_perfect_correlation() {
        assert_relative_eq!(bivariate_cdf(0.5, 1.0, 1.0), standard_cdf(0.5), epsilon = 1e-12);
        assert_relative_eq!(
            bivariate_cdf(0.5, 1.0, -1.0),
            (standard_cdf(0.5) + standard_cdf(1.0) - 1.0).max(0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_trivariate_origin_closed_form() {
        // P(Z <= 0) = 1/8 + (asin r12 + asin r13 + asin r23) / (4 pi)
        let r = DMatrix::from_row_slice(3, 3, &[1.0, 0.5, 0.3, 0.5, 1.0, 0.2, 0.3, 0.2, 1.0]);
        let l = r.clone().cholesky().unwrap().l();
        let p = orthant_cdf(&[0.0, 0.0, 0.0], &r, &l);
        let exact = 0.125 + (0.5f64.asin() + 0.3f64.asin() + 0.2f64.asin()) / (4.0 * PI);
        assert_relative_eq!(p, exact, epsilon = 1e-4);
    }

    #[test]
    fn test_trivariate_infinite_coordinate_reduces() {
        let r = DMatrix::from_row_slice(3, 3, &[1.0, 0.5, 0.3, 0.5, 1.0, 0.2, 0.3, 0.2, 1.0]);
        let l = r.clone().cholesky().unwrap().l();
        let p = orthant_cdf(&[0.4, f64::INFINITY, -0.1], &r, &l);
        assert_relative_eq!(p, bivariate_cdf(0.4, -0.1, 0.3), epsilon = 1e-12);
    }
}
