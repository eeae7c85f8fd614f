//! Gaussian process surrogate with an RBF kernel

use faer::prelude::SpSolver;
use faer::solvers::Cholesky;
use faer::{Mat, Side};

/// Kernel length scale in unit-cube coordinates
pub const LENGTH_SCALE: f64 = 1.0;

/// Observation noise added to the kernel diagonal
pub const NOISE: f64 = 1e-4;

/// Exploration weight of the upper confidence bound
pub const UCB_BETA: f64 = 2.6;

fn rbf(a: &[f64], b: &[f64], length_scale: f64) -> f64 {
    let sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    (-0.5 * sq / (length_scale * length_scale)).exp()
}

/// GP regression fitted on normalized targets
pub struct GaussianProcess {
    points: Vec<Vec<f64>>,
    chol: Cholesky<f64>,
    alpha: Vec<f64>,
    y_mean: f64,
    y_std: f64,
    length_scale: f64,
}

impl GaussianProcess {
    /// Fit on observed `(point, score)` pairs. `None` when there is nothing
    /// to fit or the kernel matrix cannot be factored.
    pub fn fit(points: &[Vec<f64>], scores: &[f64], length_scale: f64, noise: f64) -> Option<Self> {
        if points.is_empty() || points.len() != scores.len() {
            return None;
        }

        let count = scores.len() as f64;
        let y_mean = scores.iter().sum::<f64>() / count;
        let var = scores.iter().map(|y| (y - y_mean).powi(2)).sum::<f64>() / count;
        let y_std = if var > 1e-12 { var.sqrt() } else { 1.0 };
        let ys: Vec<f64> = scores.iter().map(|y| (y - y_mean) / y_std).collect();

        let n = points.len();
        let kernel = Mat::from_fn(n, n, |i, j| {
            rbf(&points[i], &points[j], length_scale) + if i == j { noise } else { 0.0 }
        });
        let chol = kernel.cholesky(Side::Lower).ok()?;

        let targets = Mat::from_fn(n, 1, |i, _| ys[i]);
        let solved = chol.solve(&targets);
        let alpha: Vec<f64> = (0..n).map(|i| solved.read(i, 0)).collect();
        if alpha.iter().any(|a| !a.is_finite()) {
            return None;
        }

        Some(Self {
            points: points.to_vec(),
            chol,
            alpha,
            y_mean,
            y_std,
            length_scale,
        })
    }

    /// Posterior `(mean, std)` at `x`, in score units
    pub fn predict(&self, x: &[f64]) -> (f64, f64) {
        let k: Vec<f64> = self
            .points
            .iter()
            .map(|p| rbf(p, x, self.length_scale))
            .collect();
        let mean: f64 = k.iter().zip(&self.alpha).map(|(a, b)| a * b).sum();
        // k^T K^-1 k
        let rhs = Mat::from_fn(k.len(), 1, |i, _| k[i]);
        let solved = self.chol.solve(&rhs);
        let explained: f64 = k.iter().enumerate().map(|(i, ki)| ki * solved.read(i, 0)).sum();
        let var = (1.0 - explained).max(1e-12);
        (
            mean * self.y_std + self.y_mean,
            var.sqrt() * self.y_std,
        )
    }

    /// Upper confidence bound `mean + beta * std`
    pub fn ucb(&self, x: &[f64], beta: f64) -> f64 {
        let (mean, std) = self.predict(x);
        mean + beta * std
    }
}
