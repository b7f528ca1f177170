//! Composite Gauss-Legendre quadrature.

use std::f64::consts::PI;

use sk_core::Result;

/// Quadrature resolution used by covariance and conditional integrals.
#[derive(Debug, Clone, Copy)]
pub struct QuadratureConfig {
    /// Number of sub-intervals per axis.
    pub panels: usize,
    /// Gauss-Legendre nodes per sub-interval.
    pub nodes_per_panel: usize,
}

impl Default for QuadratureConfig {
    fn default() -> Self {
        Self { panels: 8, nodes_per_panel: 16 }
    }
}

/// Gauss-Legendre rule on `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct GaussLegendre {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendre {
    /// Build an `n`-point rule (`n >= 1`).
    pub fn new(n: usize) -> Self {
        let n = n.max(1);
        let mut nodes = vec![0.0; n];
        let mut weights = vec![0.0; n];
        let m = n.div_ceil(2);
        let nf = n as f64;
        for i in 0..m {
            // Tricomi initial guess, then Newton on P_n.
            let mut z = (PI * (i as f64 + 0.75) / (nf + 0.5)).cos();
            let mut dp = 1.0;
            for _ in 0..100 {
                let mut p0 = 1.0;
                let mut p1 = 0.0;
                for j in 0..n {
                    let p2 = p1;
                    p1 = p0;
                    let jf = j as f64;
                    p0 = ((2.0 * jf + 1.0) * z * p1 - jf * p2) / (jf + 1.0);
                }
                dp = nf * (z * p0 - p1) / (z * z - 1.0);
                let dz = p0 / dp;
                z -= dz;
                if dz.abs() < 1e-15 {
                    break;
                }
            }
            nodes[i] = -z;
            nodes[n - 1 - i] = z;
            let w = 2.0 / ((1.0 - z * z) * dp * dp);
            weights[i] = w;
            weights[n - 1 - i] = w;
        }
        Self { nodes, weights }
    }

    /// Nodes on `[-1, 1]`, ascending.
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Weights matching [`Self::nodes`].
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Nodes and weights mapped onto `[a, b]` split into `panels` equal pieces.
    pub fn composite_nodes(&self, a: f64, b: f64, panels: usize) -> (Vec<f64>, Vec<f64>) {
        let panels = panels.max(1);
        let h = (b - a) / panels as f64;
        let mut xs = Vec::with_capacity(panels * self.nodes.len());
        let mut ws = Vec::with_capacity(panels * self.nodes.len());
        for k in 0..panels {
            let lo = a + k as f64 * h;
            let half = 0.5 * h;
            let mid = lo + half;
            for (t, w) in self.nodes.iter().zip(&self.weights) {
                xs.push(mid + half * t);
                ws.push(half * w);
            }
        }
        (xs, ws)
    }

    /// Integrate `f` over `[a, b]` with `panels` sub-intervals.
    pub fn integrate<F>(&self, mut f: F, a: f64, b: f64, panels: usize) -> Result<f64>
    where
        F: FnMut(f64) -> Result<f64>,
    {
        let (xs, ws) = self.composite_nodes(a, b, panels);
        let mut acc = 0.0;
        for (x, w) in xs.into_iter().zip(ws) {
            acc += w * f(x)?;
        }
        Ok(acc)
    }
}
