//! REAL/FAKE text classifier: TF-IDF features + logistic regression,
//! persisted as a single JSON document.

pub mod logreg;
mod stopwords;
pub mod tfidf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use logreg::LogisticRegression;
use tfidf::TfidfVectorizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Fake,
    Real,
}

impl Label {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Label::Fake),
            1 => Some(Label::Real),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Label::Fake => 0,
            Label::Real => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Fake => "FAKE",
            Label::Real => "REAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub label: Label,
    /// Probability of `label`; always >= 0.5.
    pub confidence: f64,
    pub p_real: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainParams {
    pub max_df: f64,
    pub c: f64,
    pub max_iter: usize,
    pub seed: u64,
    pub stop_words: bool,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            max_df: 0.7,
            c: 1.0,
            max_iter: 100,
            seed: 42,
            stop_words: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMeta {
    pub trained_at: DateTime<Utc>,
    pub n_features: usize,
    pub n_samples: usize,
    pub params: TrainParams,
    #[serde(default)]
    pub run_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub vectorizer: TfidfVectorizer,
    pub classifier: LogisticRegression,
    pub meta: ModelMeta,
}

impl Model {
    pub fn fit<S: AsRef<str>>(docs: &[S], labels: &[u8], params: &TrainParams) -> Result<Self> {
        anyhow::ensure!(
            docs.len() == labels.len(),
            "docs/labels length mismatch ({} vs {})",
            docs.len(),
            labels.len()
        );
        let vectorizer = TfidfVectorizer::fit(docs, params.max_df, params.stop_words)?;
        let rows: Vec<_> = docs
            .iter()
            .map(|d| vectorizer.transform(d.as_ref()))
            .collect();
        let classifier = LogisticRegression::fit(
            &rows,
            labels,
            vectorizer.n_features(),
            params.c,
            params.max_iter,
        );

        Ok(Self {
            meta: ModelMeta {
                trained_at: Utc::now(),
                n_features: vectorizer.n_features(),
                n_samples: docs.len(),
                params: params.clone(),
                run_id: None,
            },
            vectorizer,
            classifier,
        })
    }

    pub fn predict_proba(&self, text: &str) -> [f64; 2] {
        self.classifier
            .predict_proba(&self.vectorizer.transform(text))
    }

    pub fn predict(&self, text: &str) -> Prediction {
        let [p_fake, p_real] = self.predict_proba(text);
        let label = if p_real >= 0.5 { Label::Real } else { Label::Fake };
        Prediction {
            label,
            confidence: p_real.max(p_fake),
            p_real,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("reading model {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parsing model {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let bytes = serde_json::to_vec(self).context("serializing model")?;
        fs::write(path, bytes).with_context(|| format!("writing model {}", path.display()))
    }
}

/// Where the live model came from; reported by `/model-info`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelOrigin {
    Registry,
    Local,
}

#[derive(Clone)]
struct Loaded {
    model: Arc<Model>,
    origin: ModelOrigin,
}

/// Shared, swappable model. Readers predict concurrently; retraining swaps
/// the whole model in one write.
#[derive(Clone, Default)]
pub struct ModelHandle {
    inner: Arc<RwLock<Option<Loaded>>>,
}

impl ModelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: Model, origin: ModelOrigin) -> Self {
        let h = Self::new();
        h.swap(model, origin);
        h
    }

    pub fn swap(&self, model: Model, origin: ModelOrigin) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = Some(Loaded {
                model: Arc::new(model),
                origin,
            });
        }
        metrics::gauge!("model_loaded").set(1.0);
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.read().map(|g| g.is_some()).unwrap_or(false)
    }

    pub fn current(&self) -> Option<Arc<Model>> {
        self.inner
            .read()
            .ok()
            .and_then(|g| g.as_ref().map(|l| l.model.clone()))
    }

    pub fn origin(&self) -> Option<ModelOrigin> {
        self.inner
            .read()
            .ok()
            .and_then(|g| g.as_ref().map(|l| l.origin.clone()))
    }

    /// `None` when no model is loaded.
    pub fn predict(&self, text: &str) -> Option<Prediction> {
        self.current().map(|m| m.predict(text))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn toy_corpus() -> (Vec<&'static str>, Vec<u8>) {
        (
            vec![
                "shocking secret miracle cure doctors hate",
                "unbelievable conspiracy exposed secret plot",
                "miracle weight loss shocking trick revealed",
                "senate committee approves annual budget report",
                "central bank holds interest rates steady says official",
                "parliament debates infrastructure spending bill",
            ],
            vec![0, 0, 0, 1, 1, 1],
        )
    }

    #[test]
    fn label_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Label::Real).unwrap(), "\"REAL\"");
        assert_eq!(Label::from_u8(0), Some(Label::Fake));
        assert_eq!(Label::from_u8(3), None);
    }

    #[test]
    fn fits_and_predicts_toy_corpus() {
        let (docs, labels) = toy_corpus();
        let params = TrainParams {
            max_iter: 300,
            ..TrainParams::default()
        };
        let m = Model::fit(&docs, &labels, &params).unwrap();

        let fake = m.predict("a shocking secret miracle");
        assert_eq!(fake.label, Label::Fake);
        assert!(fake.confidence >= 0.5);

        let real = m.predict("the senate budget committee report");
        assert_eq!(real.label, Label::Real);
        assert!(real.confidence >= 0.5 && real.confidence <= 1.0);
    }

    #[test]
    fn save_and_load_roundtrip_predicts_identically() {
        let (docs, labels) = toy_corpus();
        let m = Model::fit(&docs, &labels, &TrainParams::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model/model.json");
        m.save(&path).unwrap();
        let back = Model::load(&path).unwrap();
        let text = "central bank secret plot";
        assert_eq!(m.predict(text), back.predict(text));
    }

    #[test]
    fn handle_reports_unloaded_then_loaded() {
        let h = ModelHandle::new();
        assert!(!h.is_loaded());
        assert!(h.predict("anything").is_none());

        let (docs, labels) = toy_corpus();
        h.swap(
            Model::fit(&docs, &labels, &TrainParams::default()).unwrap(),
            ModelOrigin::Local,
        );
        assert!(h.is_loaded());
        assert_eq!(h.origin(), Some(ModelOrigin::Local));
        assert!(h.predict("budget").is_some());
    }
}
