//! User corrections collected as CSV for the next retraining run.

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DEFAULT_SOURCE: &str = "user_feedback";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub text: String,
    pub predicted_label: u8,
    /// Corrected label.
    pub label: u8,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedbackStats {
    pub total_feedback: usize,
    pub fake_to_real: usize,
    pub real_to_fake: usize,
    pub sources: BTreeMap<String, usize>,
}

#[derive(Debug)]
pub struct FeedbackCollector {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FeedbackCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn submit(
        &self,
        text: &str,
        predicted_label: u8,
        corrected_label: u8,
        source: Option<&str>,
    ) -> Result<()> {
        anyhow::ensure!(
            predicted_label <= 1 && corrected_label <= 1,
            "labels must be 0 (fake) or 1 (real)"
        );
        let source = source
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SOURCE);

        let _g = self.lock.lock().map_err(|_| anyhow::anyhow!("feedback lock poisoned"))?;
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let fresh = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        let mut w = csv::WriterBuilder::new()
            .has_headers(fresh)
            .from_writer(file);
        w.serialize(FeedbackRecord {
            text: text.to_string(),
            predicted_label,
            label: corrected_label,
            source: source.to_string(),
        })?;
        w.flush()?;
        Ok(())
    }

    /// All rows; empty when the file does not exist.
    pub fn read_all(&self) -> Result<Vec<FeedbackRecord>> {
        read_feedback(&self.path)
    }

    pub fn stats(&self) -> Result<FeedbackStats> {
        let rows = self.read_all()?;
        let mut s = FeedbackStats {
            total_feedback: rows.len(),
            ..Default::default()
        };
        for r in &rows {
            match (r.predicted_label, r.label) {
                (0, 1) => s.fake_to_real += 1,
                (1, 0) => s.real_to_fake += 1,
                _ => {}
            }
            *s.sources.entry(r.source.clone()).or_default() += 1;
        }
        Ok(s)
    }

    /// Copy the feedback file; defaults to a timestamped name beside it.
    /// None when there is nothing to export.
    pub fn export(&self, out: Option<&Path>) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            tracing::info!("no feedback data to export");
            return Ok(None);
        }
        let target = match out {
            Some(p) => p.to_path_buf(),
            None => {
                let ts = Local::now().format("%Y%m%d_%H%M%S");
                self.path
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(format!("feedback_export_{ts}.csv"))
            }
        };
        let _g = self.lock.lock().map_err(|_| anyhow::anyhow!("feedback lock poisoned"))?;
        fs::copy(&self.path, &target)
            .with_context(|| format!("exporting feedback to {}", target.display()))?;
        tracing::info!(path = %target.display(), "feedback exported");
        Ok(Some(target))
    }

    pub fn clear(&self, backup: bool) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        if backup {
            self.export(None)?;
        }
        let _g = self.lock.lock().map_err(|_| anyhow::anyhow!("feedback lock poisoned"))?;
        fs::remove_file(&self.path).with_context(|| format!("removing {}", self.path.display()))?;
        tracing::info!("feedback cleared");
        Ok(())
    }
}

pub fn read_feedback(path: &Path) -> Result<Vec<FeedbackRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut r = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut out = Vec::new();
    for (i, row) in r.deserialize().enumerate() {
        let rec: FeedbackRecord =
            row.with_context(|| format!("feedback row {} in {}", i + 1, path.display()))?;
        out.push(rec);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_stats_export_clear() {
        let dir = tempfile::tempdir().unwrap();
        let fc = FeedbackCollector::new(dir.path().join("data/feedback.csv"));
        assert_eq!(fc.stats().unwrap(), FeedbackStats::default());
        assert!(fc.export(None).unwrap().is_none());

        fc.submit("Aliens, with \"quotes\", land", 1, 0, None).unwrap();
        fc.submit("Budget passes", 0, 1, Some("user_ann")).unwrap();
        fc.submit("Budget passes again", 0, 1, Some("  ")).unwrap();
        assert!(fc.submit("bad", 2, 0, None).is_err());

        let rows = fc.read_all().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].text, "Aliens, with \"quotes\", land");
        assert_eq!(rows[2].source, DEFAULT_SOURCE);

        let s = fc.stats().unwrap();
        assert_eq!(s.total_feedback, 3);
        assert_eq!(s.fake_to_real, 2);
        assert_eq!(s.real_to_fake, 1);
        assert_eq!(s.sources.get(DEFAULT_SOURCE), Some(&2));

        let out = dir.path().join("copy.csv");
        assert_eq!(fc.export(Some(&out)).unwrap(), Some(out.clone()));
        assert_eq!(read_feedback(&out).unwrap().len(), 3);

        fc.clear(true).unwrap();
        assert!(!fc.path().exists());
        let backups = fs::read_dir(dir.path().join("data"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("feedback_export_"))
            .count();
        assert_eq!(backups, 1);
    }
}
