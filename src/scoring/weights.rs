//! Trust factor weights with hot-reload from `config/trust_weights.json`.
//!
//! JSON shape:
//! {
//!   "source_credibility": 0.30,
//!   "content_analysis": 0.25,
//!   "language_analysis": 0.25,
//!   "fact_verification": 0.20
//! }
//!
//! On each `current()` call we check the file's modified time and reload if changed.

use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::RwLock,
    time::SystemTime,
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustWeights {
    pub source_credibility: f64,
    pub content_analysis: f64,
    pub language_analysis: f64,
    pub fact_verification: f64,
}

impl Default for TrustWeights {
    fn default() -> Self {
        Self {
            source_credibility: 0.30,
            content_analysis: 0.25,
            language_analysis: 0.25,
            fact_verification: 0.20,
        }
    }
}

impl TrustWeights {
    pub fn total(&self) -> f64 {
        self.source_credibility + self.content_analysis + self.language_analysis + self.fact_verification
    }

    /// Negative or non-finite entries are invalid, and so is an all-zero set.
    pub fn is_valid(&self) -> bool {
        let all = [
            self.source_credibility,
            self.content_analysis,
            self.language_analysis,
            self.fact_verification,
        ];
        all.iter().all(|w| w.is_finite() && *w >= 0.0) && self.total() > 0.0
    }
}

#[derive(Debug)]
pub struct HotReloadWeights {
    path: PathBuf,
    inner: RwLock<State>,
}

#[derive(Debug)]
struct State {
    weights: TrustWeights,
    last_modified: Option<SystemTime>,
}

impl HotReloadWeights {
    pub fn new(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("config/trust_weights.json"));
        Self {
            path,
            inner: RwLock::new(State {
                weights: TrustWeights::default(),
                last_modified: None,
            }),
        }
    }

    /// Latest weights, reloading if the config file changed. A missing,
    /// unreadable or invalid file means defaults.
    pub fn current(&self) -> TrustWeights {
        let mtime = fs::metadata(&self.path).and_then(|m| m.modified()).ok();

        let cached = match self.inner.read() {
            Ok(g) => (g.weights, g.last_modified),
            Err(_) => return TrustWeights::default(),
        };
        if cached.1 == mtime {
            return cached.0;
        }

        let Ok(mut guard) = self.inner.write() else {
            return TrustWeights::default();
        };
        if guard.last_modified == mtime {
            return guard.weights;
        }
        guard.weights = match mtime {
            None => {
                tracing::warn!(path = %self.path.display(), "trust weights file gone; using defaults");
                TrustWeights::default()
            }
            Some(_) => match load_weights_file(&self.path) {
                Ok(w) if w.is_valid() => {
                    tracing::info!(path = %self.path.display(), ?w, "trust weights reloaded");
                    w
                }
                Ok(w) => {
                    tracing::warn!(path = %self.path.display(), ?w, "invalid trust weights; using defaults");
                    TrustWeights::default()
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "trust weights unreadable; using defaults");
                    TrustWeights::default()
                }
            },
        };
        guard.last_modified = mtime;
        guard.weights
    }
}

pub fn load_weights_file(path: &Path) -> io::Result<TrustWeights> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io::Write, thread, time::Duration};

    #[test]
    fn defaults_follow_documented_split() {
        let w = TrustWeights::default();
        assert!((w.total() - 1.0).abs() < 1e-12);
        assert!(w.is_valid());
    }

    #[test]
    fn missing_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let hot = HotReloadWeights::new(Some(&dir.path().join("nope.json")));
        assert_eq!(hot.current(), TrustWeights::default());
    }

    #[test]
    fn loads_and_hot_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust_weights.json");
        {
            let mut f = fs::File::create(&path).unwrap();
            write!(
                f,
                r#"{{"source_credibility":1,"content_analysis":1,"language_analysis":1,"fact_verification":1}}"#
            )
            .unwrap();
            f.sync_all().unwrap();
        }

        let hot = HotReloadWeights::new(Some(&path));
        assert!((hot.current().source_credibility - 1.0).abs() < 1e-12);

        // Coarse mtime granularity on some filesystems.
        thread::sleep(Duration::from_millis(1100));
        {
            let mut f = fs::File::create(&path).unwrap();
            write!(
                f,
                r#"{{"source_credibility":0,"content_analysis":0,"language_analysis":0,"fact_verification":0}}"#
            )
            .unwrap();
            f.sync_all().unwrap();
        }
        // All-zero is rejected in favour of the defaults.
        assert_eq!(hot.current(), TrustWeights::default());
    }

    #[test]
    fn deleted_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust_weights.json");
        fs::write(
            &path,
            r#"{"source_credibility":2,"content_analysis":1,"language_analysis":1,"fact_verification":1}"#,
        )
        .unwrap();

        let hot = HotReloadWeights::new(Some(&path));
        assert!((hot.current().source_credibility - 2.0).abs() < 1e-12);

        fs::remove_file(&path).unwrap();
        assert_eq!(hot.current(), TrustWeights::default());
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust_weights.json");
        fs::write(&path, "{not json").unwrap();
        let hot = HotReloadWeights::new(Some(&path));
        assert_eq!(hot.current(), TrustWeights::default());
    }
}
