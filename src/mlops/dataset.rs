//! Training data: raw Fake/True CSVs, user feedback, stratified split.

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::path::Path;

use super::config::MlopsConfig;
use super::feedback::{read_feedback, FeedbackRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub text: String,
    pub label: u8,
}

#[derive(Debug, Clone)]
pub struct PreparedData {
    pub train: Vec<Sample>,
    pub test: Vec<Sample>,
    pub hash: String,
}

/// Rows of one raw CSV; `text = title + " " + text`.
fn load_labeled_csv(path: &Path, label: u8) -> Result<Vec<Sample>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    let col = |name: &str, fallback: usize| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .unwrap_or(fallback)
    };
    let (title_idx, text_idx) = (col("title", 0), col("text", 1));

    let mut out = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let record =
            row.with_context(|| format!("reading record {} in {}", idx, path.display()))?;
        let title = record.get(title_idx).unwrap_or("").trim();
        let text = record.get(text_idx).unwrap_or("").trim();
        let combined = match (title.is_empty(), text.is_empty()) {
            (true, true) => continue,
            (true, false) => text.to_string(),
            (false, true) => title.to_string(),
            (false, false) => format!("{title} {text}"),
        };
        out.push(Sample {
            text: combined,
            label,
        });
    }
    Ok(out)
}

/// `Fake.csv` (label 0) followed by `True.csv` (label 1).
pub fn load_raw(raw_dir: &Path) -> Result<Vec<Sample>> {
    let mut all = load_labeled_csv(&raw_dir.join("Fake.csv"), 0)?;
    all.extend(load_labeled_csv(&raw_dir.join("True.csv"), 1)?);
    Ok(all)
}

pub fn combine_with_feedback(mut samples: Vec<Sample>, feedback: &[FeedbackRecord]) -> Vec<Sample> {
    samples.extend(
        feedback
            .iter()
            .filter(|f| f.label <= 1 && !f.text.trim().is_empty())
            .map(|f| Sample {
                text: f.text.clone(),
                label: f.label,
            }),
    );
    samples
}

/// Per-class shuffle and cut, so both halves keep the class ratio.
/// Deterministic for a given `seed`.
pub fn stratified_split(samples: &[Sample], test_size: f64, seed: u64) -> (Vec<Sample>, Vec<Sample>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let test_size = test_size.clamp(0.0, 1.0);
    let (mut train, mut test) = (Vec::new(), Vec::new());

    for label in [0u8, 1u8] {
        let mut idx: Vec<usize> = samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.label == label)
            .map(|(i, _)| i)
            .collect();
        idx.shuffle(&mut rng);
        let n_test = ((idx.len() as f64) * test_size).round() as usize;
        let (t, r) = idx.split_at(n_test.min(idx.len()));
        test.extend(t.iter().map(|&i| samples[i].clone()));
        train.extend(r.iter().map(|&i| samples[i].clone()));
    }
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    (train, test)
}

pub fn dataset_hash(samples: &[Sample]) -> String {
    let mut h = Sha256::new();
    for s in samples {
        h.update(s.text.as_bytes());
        h.update([0x1f, b'0' + s.label, b'\n']);
    }
    format!("{:x}", h.finalize())
}

pub fn write_samples(path: &Path, samples: &[Sample]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let mut w = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for s in samples {
        w.serialize(s)?;
    }
    w.flush()?;
    Ok(())
}

pub fn read_samples(path: &Path) -> Result<Vec<Sample>> {
    let mut r = csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    r.deserialize::<Sample>()
        .map(|row| row.with_context(|| format!("reading {}", path.display())))
        .collect()
}

/// Load raw data (plus feedback), split, and write `train.csv` / `test.csv`.
pub fn prepare(cfg: &MlopsConfig, include_feedback: bool) -> Result<PreparedData> {
    let mut samples = load_raw(&cfg.raw_dir)?;
    if include_feedback {
        let fb = read_feedback(&cfg.feedback_path)?;
        if !fb.is_empty() {
            tracing::info!(rows = fb.len(), "adding feedback to training data");
        }
        samples = combine_with_feedback(samples, &fb);
    }
    anyhow::ensure!(!samples.is_empty(), "no training data in {}", cfg.raw_dir.display());

    let hash = dataset_hash(&samples);
    let (train, test) = stratified_split(&samples, cfg.test_size, cfg.seed);
    write_samples(&cfg.processed_dir.join("train.csv"), &train)?;
    write_samples(&cfg.processed_dir.join("test.csv"), &test)?;
    tracing::info!(train = train.len(), test = test.len(), hash = %hash, "dataset prepared");
    Ok(PreparedData { train, test, hash })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(n_fake: usize, n_real: usize) -> Vec<Sample> {
        (0..n_fake)
            .map(|i| Sample { text: format!("fake {i}"), label: 0 })
            .chain((0..n_real).map(|i| Sample { text: format!("real {i}"), label: 1 }))
            .collect()
    }

    #[test]
    fn split_keeps_ratio_and_is_deterministic() {
        let data = samples(60, 40);
        let (train, test) = stratified_split(&data, 0.2, 42);
        assert_eq!(test.len(), 20);
        assert_eq!(train.len(), 80);
        assert_eq!(test.iter().filter(|s| s.label == 0).count(), 12);
        assert_eq!(train.iter().filter(|s| s.label == 1).count(), 32);

        let again = stratified_split(&data, 0.2, 42);
        assert_eq!(again.0, train);
        assert_eq!(again.1, test);
        let other = stratified_split(&data, 0.2, 7);
        assert_ne!(other.1, test);
    }

    #[test]
    fn hash_depends_on_content() {
        let a = samples(3, 3);
        let mut b = a.clone();
        assert_eq!(dataset_hash(&a), dataset_hash(&b));
        b[0].label = 1;
        assert_ne!(dataset_hash(&a), dataset_hash(&b));
    }

    #[test]
    fn raw_csvs_combine_title_and_text() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Fake.csv"),
            "title,text,subject,date\n\"Aliens land\",\"They came, they saw\",news,2017\n,,x,y\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("True.csv"),
            "title,text,subject,date\nBudget,Council votes,politics,2017\n",
        )
        .unwrap();
        let all = load_raw(dir.path()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], Sample { text: "Aliens land They came, they saw".into(), label: 0 });
        assert_eq!(all[1].label, 1);

        let fb = vec![FeedbackRecord {
            text: "fixed".into(),
            predicted_label: 0,
            label: 1,
            source: "user_feedback".into(),
        }];
        assert_eq!(combine_with_feedback(all, &fb).len(), 3);
    }
}
