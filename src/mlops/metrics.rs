//! Held-out evaluation: accuracy, support-weighted precision/recall/F1, ROC AUC.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: f64,
}

impl EvalMetrics {
    pub fn to_map(self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("accuracy".to_string(), self.accuracy),
            ("precision".to_string(), self.precision),
            ("recall".to_string(), self.recall),
            ("f1".to_string(), self.f1),
            ("roc_auc".to_string(), self.roc_auc),
        ])
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

pub fn evaluate(y_true: &[u8], y_pred: &[u8], p_real: &[f64]) -> EvalMetrics {
    let n = y_true.len().min(y_pred.len());
    let correct = (0..n).filter(|&i| y_true[i] == y_pred[i]).count();

    let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
    for class in [0u8, 1u8] {
        let tp = (0..n).filter(|&i| y_pred[i] == class && y_true[i] == class).count();
        let predicted = (0..n).filter(|&i| y_pred[i] == class).count();
        let support = (0..n).filter(|&i| y_true[i] == class).count();
        let p = ratio(tp, predicted);
        let r = ratio(tp, support);
        let f = if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) };
        let w = ratio(support, n);
        precision += w * p;
        recall += w * r;
        f1 += w * f;
    }

    EvalMetrics {
        accuracy: ratio(correct, n),
        precision,
        recall,
        f1,
        roc_auc: roc_auc(&y_true[..n.min(p_real.len())], p_real),
    }
}

/// Mann-Whitney rank statistic with average ranks for ties.
/// 0.5 when only one class is present.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> f64 {
    let n = y_true.len().min(scores.len());
    let n_pos = y_true[..n].iter().filter(|&&y| y == 1).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based average rank of the tie block i..=j
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = (0..n).filter(|&k| y_true[k] == 1).map(|k| ranks[k]).sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    u / (n_pos * n_neg) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_and_inverted() {
        let y = [0, 0, 1, 1];
        let m = evaluate(&y, &y, &[0.1, 0.2, 0.8, 0.9]);
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.f1, 1.0);
        assert_eq!(m.roc_auc, 1.0);
        assert_eq!(roc_auc(&y, &[0.9, 0.8, 0.2, 0.1]), 0.0);
    }

    #[test]
    fn ties_count_half() {
        assert_eq!(roc_auc(&[0, 1], &[0.5, 0.5]), 0.5);
        // pos {0.8, 0.4} vs neg {0.4, 0.1}: pairs 1 + 1 + 0.5 + 1 = 3.5 of 4
        assert!((roc_auc(&[1, 1, 0, 0], &[0.8, 0.4, 0.4, 0.1]) - 0.875).abs() < 1e-12);
        assert_eq!(roc_auc(&[1, 1], &[0.2, 0.3]), 0.5);
    }

    #[test]
    fn weighted_scores() {
        // 3 fake, 1 real; everything predicted fake.
        let m = evaluate(&[0, 0, 0, 1], &[0, 0, 0, 0], &[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(m.accuracy, 0.75);
        // fake: p=0.75 r=1; real: p=0 r=0 -> weighted 0.75*0.75
        assert!((m.precision - 0.5625).abs() < 1e-12);
        assert!((m.recall - 0.75).abs() < 1e-12);
        assert_eq!(m.roc_auc, 1.0);
    }
}
