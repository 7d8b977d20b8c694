//! Local MLOps: dataset prep, training, model registry, drift detection,
//! user feedback and scheduled retraining.

pub mod config;
pub mod dataset;
pub mod drift;
pub mod feedback;
pub mod metrics;
pub mod registry;
pub mod retrain;
pub mod train;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

pub use config::MlopsConfig;
pub use feedback::{FeedbackCollector, FeedbackStats};
pub use registry::{ModelRegistry, RegistryEntry, Stage};

use crate::classifier::{Model, ModelHandle, ModelOrigin};

/// Config plus the stores built from it.
#[derive(Debug)]
pub struct Mlops {
    pub config: MlopsConfig,
    pub registry: ModelRegistry,
    pub feedback: FeedbackCollector,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub source: ModelOrigin,
    pub mlops_available: bool,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_stage: Option<String>,
}

impl Mlops {
    pub fn new(config: MlopsConfig) -> Self {
        Self {
            registry: ModelRegistry::new(&config.registry_dir, config.model_name.clone()),
            feedback: FeedbackCollector::new(&config.feedback_path),
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::new(MlopsConfig::from_env())
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn serving_stage(&self) -> Stage {
        self.config.model_stage.parse().unwrap_or(Stage::Production)
    }

    /// Registry model for the serving stage, else the local model file.
    pub fn load_initial_model(&self, local_path: &Path) -> Option<(Model, ModelOrigin)> {
        if self.enabled() {
            match self.registry.load_stage(self.serving_stage()) {
                Ok(Some((entry, model))) => {
                    tracing::info!(run_id = %entry.run_id, version = entry.version, "model loaded from registry");
                    return Some((model, ModelOrigin::Registry));
                }
                Ok(None) => tracing::info!("registry has no serving model; trying local file"),
                Err(e) => tracing::warn!(error = %e, "registry load failed; trying local file"),
            }
        }
        match Model::load(local_path) {
            Ok(m) => {
                tracing::info!(path = %local_path.display(), "model loaded from local file");
                Some((m, ModelOrigin::Local))
            }
            Err(e) => {
                tracing::warn!(error = %e, "no model available; prediction endpoints will return 503");
                None
            }
        }
    }

    /// Description of the serving model for `/model-info`.
    pub fn model_info(&self, handle: &ModelHandle) -> ModelInfo {
        let unknown = |mlops_available: bool| ModelInfo {
            source: handle.origin().unwrap_or(ModelOrigin::Local),
            mlops_available,
            version: "unknown".into(),
            run_id: None,
            created_at: None,
            current_stage: None,
            model_name: None,
            model_stage: None,
        };
        if !self.enabled() {
            return unknown(false);
        }
        if handle.origin() != Some(ModelOrigin::Registry) {
            return unknown(true);
        }
        let live_run = handle.current().and_then(|m| m.meta.run_id.clone());
        let entry = match self.registry.list() {
            Ok(all) => all
                .into_iter()
                .find(|e| Some(&e.run_id) == live_run.as_ref()),
            Err(e) => {
                tracing::warn!(error = %e, "registry unreadable");
                None
            }
        };
        match entry {
            Some(e) => ModelInfo {
                source: ModelOrigin::Registry,
                mlops_available: true,
                version: e.version.to_string(),
                run_id: Some(e.run_id),
                created_at: Some(e.created_at),
                current_stage: Some(e.stage.to_string()),
                model_name: Some(self.config.model_name.clone()),
                model_stage: Some(self.config.model_stage.clone()),
            },
            None => unknown(true),
        }
    }
}
