//! Concept drift between a reference and a current text sample.
//!
//! Data drift: per-feature two-sample Kolmogorov-Smirnov tests on word
//! counts over the reference's top-1000 vocabulary. Prediction and
//! confidence drift compare the live model's behaviour on both samples.

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::config::MlopsConfig;
use super::dataset::read_samples;
use crate::classifier::tfidf::tokenize;
use crate::classifier::Model;

pub const MAX_FEATURES: usize = 1000;
pub const FEATURE_P_VALUE: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataDrift {
    pub drift_score: f64,
    pub n_features: usize,
    pub n_drifted: usize,
    pub drifted_features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub data_drift: DataDrift,
    pub prediction_drift: Option<f64>,
    pub confidence_drift: Option<f64>,
    pub drift_detected: bool,
    pub drift_reasons: Vec<String>,
    pub threshold: f64,
    pub timestamp: String,
    #[serde(default)]
    pub report_path: Option<PathBuf>,
}

/// Top-`k` words by total count in `docs`; ties broken alphabetically.
pub fn count_vocabulary<S: AsRef<str>>(docs: &[S], k: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for d in docs {
        for tok in tokenize(d.as_ref()) {
            *counts.entry(tok).or_default() += 1;
        }
    }
    let mut words: Vec<(String, usize)> = counts.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words.into_iter().take(k).map(|(w, _)| w).collect()
}

/// Column-major count matrix: `out[f][d]` = occurrences of feature `f` in doc `d`.
fn count_columns<S: AsRef<str>>(docs: &[S], vocab: &HashMap<&str, usize>) -> Vec<Vec<f64>> {
    let mut cols = vec![vec![0.0; docs.len()]; vocab.len()];
    for (d, doc) in docs.iter().enumerate() {
        for tok in tokenize(doc.as_ref()) {
            if let Some(&f) = vocab.get(tok.as_str()) {
                cols[f][d] += 1.0;
            }
        }
    }
    cols
}

/// Two-sample KS statistic and asymptotic p-value.
pub fn ks_2samp(a: &[f64], b: &[f64]) -> (f64, f64) {
    if a.is_empty() || b.is_empty() {
        return (0.0, 1.0);
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);
    let (n, m) = (a.len(), b.len());

    let (mut i, mut j, mut d) = (0usize, 0usize, 0.0f64);
    while i < n && j < m {
        let v = a[i].min(b[j]);
        while i < n && a[i] <= v {
            i += 1;
        }
        while j < m && b[j] <= v {
            j += 1;
        }
        d = d.max((i as f64 / n as f64 - j as f64 / m as f64).abs());
    }

    let ne = (n * m) as f64 / (n + m) as f64;
    let sq = ne.sqrt();
    let lambda = (sq + 0.12 + 0.11 / sq) * d;
    (d, kolmogorov_q(lambda))
}

/// Survival function of the Kolmogorov distribution.
fn kolmogorov_q(lambda: f64) -> f64 {
    if lambda < 1e-3 {
        return 1.0;
    }
    let a2 = -2.0 * lambda * lambda;
    let (mut fac, mut sum, mut prev) = (2.0, 0.0, 0.0);
    for j in 1..=100 {
        let jf = j as f64;
        let term = fac * (a2 * jf * jf).exp();
        sum += term;
        if term.abs() <= 1e-3 * prev || term.abs() <= 1e-8 * sum {
            return sum.clamp(0.0, 1.0);
        }
        fac = -fac;
        prev = term.abs();
    }
    1.0
}

pub fn data_drift<S: AsRef<str>>(reference: &[S], current: &[S]) -> DataDrift {
    let vocab_words = count_vocabulary(reference, MAX_FEATURES);
    let vocab: HashMap<&str, usize> = vocab_words
        .iter()
        .enumerate()
        .map(|(i, w)| (w.as_str(), i))
        .collect();
    let ref_cols = count_columns(reference, &vocab);
    let cur_cols = count_columns(current, &vocab);

    let drifted_features: Vec<String> = vocab_words
        .iter()
        .enumerate()
        .filter(|(f, _)| ks_2samp(&ref_cols[*f], &cur_cols[*f]).1 < FEATURE_P_VALUE)
        .map(|(_, w)| w.clone())
        .collect();

    let n_features = vocab_words.len();
    DataDrift {
        drift_score: if n_features == 0 {
            0.0
        } else {
            drifted_features.len() as f64 / n_features as f64
        },
        n_features,
        n_drifted: drifted_features.len(),
        drifted_features,
    }
}

/// |Δ positive rate| and |Δ mean confidence| between the two samples.
pub fn model_drift<S: AsRef<str>>(model: &Model, reference: &[S], current: &[S]) -> (f64, f64) {
    let summarize = |docs: &[S]| {
        if docs.is_empty() {
            return (0.0, 0.0);
        }
        let (mut pos, mut conf) = (0.0, 0.0);
        for d in docs {
            let p = model.predict(d.as_ref());
            pos += f64::from(p.label.as_u8());
            conf += p.confidence;
        }
        let n = docs.len() as f64;
        (pos / n, conf / n)
    };
    let (rp, rc) = summarize(reference);
    let (cp, cc) = summarize(current);
    ((rp - cp).abs(), (rc - cc).abs())
}

pub fn build_report<S: AsRef<str>>(
    reference: &[S],
    current: &[S],
    model: Option<&Model>,
    threshold: f64,
) -> DriftReport {
    let data = data_drift(reference, current);
    let (prediction_drift, confidence_drift) = match model {
        Some(m) => {
            let (p, c) = model_drift(m, reference, current);
            (Some(p), Some(c))
        }
        None => (None, None),
    };

    let mut reasons = Vec::new();
    if data.drift_score > threshold {
        reasons.push(format!(
            "data drift score {:.3} above {threshold}",
            data.drift_score
        ));
    }
    if let Some(p) = prediction_drift.filter(|p| *p > threshold) {
        reasons.push(format!("prediction drift {p:.3} above {threshold}"));
    }
    if let Some(c) = confidence_drift.filter(|c| *c > threshold) {
        reasons.push(format!("confidence drift {c:.3} above {threshold}"));
    }

    DriftReport {
        data_drift: data,
        prediction_drift,
        confidence_drift,
        drift_detected: !reasons.is_empty(),
        drift_reasons: reasons,
        threshold,
        timestamp: Utc::now().to_rfc3339(),
        report_path: None,
    }
}

/// Compare reference (default: processed train.csv) with current (default:
/// processed test.csv) and write the report under the drift dir.
/// None when either file is missing.
pub fn detect(
    cfg: &MlopsConfig,
    reference: Option<&Path>,
    current: Option<&Path>,
    model: Option<&Model>,
) -> Result<Option<DriftReport>> {
    let ref_path = reference
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cfg.processed_dir.join("train.csv"));
    let cur_path = current
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cfg.processed_dir.join("test.csv"));
    if !ref_path.exists() || !cur_path.exists() {
        tracing::warn!(
            reference = %ref_path.display(),
            current = %cur_path.display(),
            "drift check skipped: data files not found"
        );
        return Ok(None);
    }

    let ref_texts: Vec<String> = read_samples(&ref_path)?.into_iter().map(|s| s.text).collect();
    let cur_texts: Vec<String> = read_samples(&cur_path)?.into_iter().map(|s| s.text).collect();
    let mut report = build_report(&ref_texts, &cur_texts, model, cfg.drift_threshold);

    fs::create_dir_all(&cfg.drift_dir)
        .with_context(|| format!("creating {}", cfg.drift_dir.display()))?;
    let path = cfg.drift_dir.join(format!(
        "drift_report_{}.json",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    report.report_path = Some(path.clone());
    fs::write(&path, serde_json::to_vec_pretty(&report)?)
        .with_context(|| format!("writing {}", path.display()))?;

    tracing::info!(
        drift_detected = report.drift_detected,
        drift_score = report.data_drift.drift_score,
        path = %path.display(),
        "drift report written"
    );
    for r in &report.drift_reasons {
        tracing::info!(reason = %r, "drift");
    }
    Ok(Some(report))
}
