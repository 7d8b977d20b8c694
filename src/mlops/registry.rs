//! File-backed model registry: `index.json` plus one model file per run.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use uuid::Uuid;

use crate::classifier::{Model, TrainParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    None,
    Staging,
    Production,
    Archived,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::None => "None",
            Stage::Staging => "Staging",
            Stage::Production => "Production",
            Stage::Archived => "Archived",
        };
        f.write_str(s)
    }
}

impl FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Stage::None),
            "staging" => Ok(Stage::Staging),
            "production" => Ok(Stage::Production),
            "archived" => Ok(Stage::Archived),
            other => bail!("unknown model stage {other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub version: u32,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub stage: Stage,
    pub params: TrainParams,
    pub metrics: BTreeMap<String, f64>,
    pub dataset_hash: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// File name relative to the registry dir.
    pub model_path: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryIndex {
    model_name: String,
    versions: Vec<RegistryEntry>,
}

#[derive(Debug)]
pub struct ModelRegistry {
    dir: PathBuf,
    model_name: String,
    lock: Mutex<()>,
}

impl ModelRegistry {
    pub fn new(dir: impl Into<PathBuf>, model_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            model_name: model_name.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join("index.json")
    }

    fn read_index(&self) -> Result<RegistryIndex> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(RegistryIndex {
                model_name: self.model_name.clone(),
                versions: Vec::new(),
            });
        }
        let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
    }

    fn write_index(&self, index: &RegistryIndex) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| format!("creating {}", self.dir.display()))?;
        let tmp = self.dir.join(".index.json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(index)?)
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, self.index_path()).context("replacing registry index")
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| anyhow::anyhow!("registry lock poisoned"))
    }

    /// Store `model` as a new version in stage `None`; returns the entry.
    pub fn log_model(
        &self,
        model: &Model,
        metrics: BTreeMap<String, f64>,
        dataset_hash: &str,
        tags: BTreeMap<String, String>,
    ) -> Result<RegistryEntry> {
        let _g = self.guard()?;
        let mut index = self.read_index()?;
        let run_id = Uuid::new_v4().simple().to_string();
        let model_file = format!("{run_id}.json");

        let mut stored = model.clone();
        stored.meta.run_id = Some(run_id.clone());
        stored.save(&self.dir.join(&model_file))?;

        let entry = RegistryEntry {
            version: index.versions.iter().map(|v| v.version).max().unwrap_or(0) + 1,
            run_id,
            created_at: Utc::now(),
            stage: Stage::None,
            params: model.meta.params.clone(),
            metrics,
            dataset_hash: dataset_hash.to_string(),
            tags,
            model_path: model_file,
        };
        index.versions.push(entry.clone());
        self.write_index(&index)?;
        tracing::info!(run_id = %entry.run_id, version = entry.version, "model logged");
        Ok(entry)
    }

    /// Move a run to `stage`. Staging and Production hold one version each;
    /// whatever held the stage before is archived.
    pub fn transition(&self, run_id: &str, stage: Stage) -> Result<RegistryEntry> {
        let _g = self.guard()?;
        let mut index = self.read_index()?;
        if !index.versions.iter().any(|v| v.run_id == run_id) {
            bail!("unknown run {run_id}");
        }
        let exclusive = matches!(stage, Stage::Staging | Stage::Production);
        let mut moved = None;
        for v in &mut index.versions {
            if v.run_id == run_id {
                v.stage = stage;
                moved = Some(v.clone());
            } else if exclusive && v.stage == stage {
                v.stage = Stage::Archived;
            }
        }
        self.write_index(&index)?;
        tracing::info!(run_id = %run_id, stage = %stage, "model stage changed");
        moved.ok_or_else(|| anyhow::anyhow!("unknown run {run_id}"))
    }

    pub fn list(&self) -> Result<Vec<RegistryEntry>> {
        Ok(self.read_index()?.versions)
    }

    /// Highest version currently in `stage`.
    pub fn latest(&self, stage: Stage) -> Result<Option<RegistryEntry>> {
        Ok(self
            .read_index()?
            .versions
            .into_iter()
            .filter(|v| v.stage == stage)
            .max_by_key(|v| v.version))
    }

    pub fn load(&self, entry: &RegistryEntry) -> Result<Model> {
        Model::load(&self.model_file(entry))
    }

    pub fn model_file(&self, entry: &RegistryEntry) -> PathBuf {
        Path::new(&self.dir).join(&entry.model_path)
    }

    pub fn load_stage(&self, stage: Stage) -> Result<Option<(RegistryEntry, Model)>> {
        match self.latest(stage)? {
            Some(e) => {
                let m = self.load(&e)?;
                Ok(Some((e, m)))
            }
            None => Ok(None),
        }
    }

    pub fn load_production(&self) -> Result<Option<(RegistryEntry, Model)>> {
        self.load_stage(Stage::Production)
    }
}
