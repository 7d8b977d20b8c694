use std::path::{Path, PathBuf};

use crate::classifier::TrainParams;
use crate::config::{env_flag, env_or, env_parse};

#[derive(Debug, Clone)]
pub struct MlopsConfig {
    pub data_dir: PathBuf,
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub model_dir: PathBuf,
    pub registry_dir: PathBuf,
    pub drift_dir: PathBuf,
    pub feedback_path: PathBuf,
    pub test_size: f64,
    pub seed: u64,
    pub max_df: f64,
    pub c: f64,
    pub max_iter: usize,
    pub drift_threshold: f64,
    pub retrain_interval_hours: u64,
    pub model_name: String,
    pub model_stage: String,
    pub enabled: bool,
}

impl MlopsConfig {
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(env_or("DATA_DIR", "data"));
        let under_data = |key: &str, leaf: &str| match std::env::var(key) {
            Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
            _ => data_dir.join(leaf),
        };
        Self {
            raw_dir: under_data("RAW_DATA_DIR", "raw"),
            processed_dir: under_data("PROCESSED_DATA_DIR", "processed"),
            feedback_path: under_data("FEEDBACK_PATH", "feedback.csv"),
            model_dir: PathBuf::from(env_or("MODEL_DIR", "model")),
            registry_dir: PathBuf::from(env_or("MLOPS_REGISTRY_DIR", "mlops/registry")),
            drift_dir: PathBuf::from(env_or("MLOPS_DRIFT_DIR", "mlops/drift")),
            test_size: env_parse("TEST_SIZE", 0.2),
            seed: env_parse("RANDOM_STATE", 42),
            max_df: env_parse("MAX_DF", 0.7),
            c: env_parse("LOGREG_C", 1.0),
            max_iter: env_parse("MAX_ITER", 100),
            drift_threshold: env_parse("DRIFT_THRESHOLD", 0.1),
            retrain_interval_hours: env_parse("RETRAIN_INTERVAL_HOURS", 168),
            model_name: env_or("MODEL_NAME", "fake-news-classifier"),
            model_stage: env_or("MODEL_STAGE", "Production"),
            enabled: env_flag("USE_MLOPS", true),
            data_dir,
        }
    }

    /// All directories under `root`, defaults elsewhere.
    pub fn rooted(root: &Path) -> Self {
        let data_dir = root.join("data");
        Self {
            raw_dir: data_dir.join("raw"),
            processed_dir: data_dir.join("processed"),
            feedback_path: data_dir.join("feedback.csv"),
            model_dir: root.join("model"),
            registry_dir: root.join("mlops/registry"),
            drift_dir: root.join("mlops/drift"),
            test_size: 0.2,
            seed: 42,
            max_df: 0.7,
            c: 1.0,
            max_iter: 100,
            drift_threshold: 0.1,
            retrain_interval_hours: 168,
            model_name: "fake-news-classifier".into(),
            model_stage: "Production".into(),
            enabled: true,
            data_dir,
        }
    }

    pub fn train_params(&self) -> TrainParams {
        TrainParams {
            max_df: self.max_df,
            c: self.c,
            max_iter: self.max_iter,
            seed: self.seed,
            ..TrainParams::default()
        }
    }

    pub fn local_model_path(&self) -> PathBuf {
        self.model_dir.join("model.json")
    }
}
