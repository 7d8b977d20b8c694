//! Binary L2-regularised logistic regression over sparse rows.
//!
//! Objective (sklearn form): `C * Σ logloss + ½‖w‖²`, bias unpenalised.
//! Solved with full-batch gradient descent using step `1/L`, where `L` bounds
//! the gradient's Lipschitz constant. No randomness, so fits are reproducible.

use serde::{Deserialize, Serialize};

use super::tfidf::SparseVec;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    bias: f64,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn dot(w: &[f64], x: &SparseVec) -> f64 {
    x.iter().map(|&(i, v)| w[i] * v).sum()
}

impl LogisticRegression {
    /// `y` holds 0 (FAKE) / 1 (REAL).
    pub fn fit(x: &[SparseVec], y: &[u8], n_features: usize, c: f64, max_iter: usize) -> Self {
        let n = x.len().max(1) as f64;
        let c = if c > 0.0 { c } else { 1.0 };
        let mut weights = vec![0.0; n_features];
        let mut bias = 0.0;

        let max_sq_norm = x
            .iter()
            .map(|r| r.iter().map(|(_, v)| v * v).sum::<f64>())
            .fold(0.0_f64, f64::max)
            .max(1e-12);
        let lipschitz = 0.25 * (max_sq_norm + 1.0) + 1.0 / (c * n);
        let step = 1.0 / lipschitz;

        let mut grad = vec![0.0; n_features];
        for _ in 0..max_iter {
            grad.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_b = 0.0;

            for (row, &label) in x.iter().zip(y) {
                let err = sigmoid(dot(&weights, row) + bias) - f64::from(label);
                for &(i, v) in row {
                    grad[i] += err * v;
                }
                grad_b += err;
            }

            for (w, g) in weights.iter_mut().zip(&grad) {
                *w -= step * (g / n + *w / (c * n));
            }
            bias -= step * grad_b / n;
        }

        Self { weights, bias }
    }

    /// `[p_fake, p_real]`.
    pub fn predict_proba(&self, x: &SparseVec) -> [f64; 2] {
        let p_real = sigmoid(dot(&self.weights, x) + self.bias);
        [1.0 - p_real, p_real]
    }

    pub fn predict(&self, x: &SparseVec) -> u8 {
        u8::from(self.predict_proba(x)[1] >= 0.5)
    }
}
