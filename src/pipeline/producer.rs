// src/pipeline/producer.rs
use anyhow::{Context, Result};
use chrono::Local;
use metrics::counter;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use super::config::PipelineConfig;
use super::stream::{Fields, StreamBus};

/// Newest `articles_*.json` in `dir` by modification time.
pub fn latest_article_file(dir: &Path) -> Option<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => {
            tracing::warn!(dir = %dir.display(), "data directory does not exist");
            return None;
        }
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name.starts_with("articles_") && name.ends_with(".json")
        })
        .filter_map(|e| {
            let mtime = e.metadata().and_then(|m| m.modified()).ok()?;
            Some((mtime, e.path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, p)| p)
}

pub fn load_articles(path: &Path) -> Result<Vec<Map<String, Value>>> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

/// Stream fields are flat strings: lists and objects become JSON, nulls are
/// dropped, and a `timestamp` is added when missing.
pub fn flatten(article: &Map<String, Value>) -> Fields {
    let mut out: Fields = article
        .iter()
        .filter_map(|(k, v)| {
            let s = match v {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((k.clone(), s))
        })
        .collect();
    out.entry("timestamp".to_string())
        .or_insert_with(|| Local::now().to_rfc3339());
    out
}

/// Publish the newest article file. Returns how many were published.
pub async fn run_once(cfg: &PipelineConfig, bus: &dyn StreamBus) -> Result<usize> {
    let Some(path) = latest_article_file(&cfg.data_dir) else {
        tracing::warn!("no article file found; run the collector first");
        return Ok(0);
    };
    tracing::info!(path = %path.display(), "latest article file");
    let articles = load_articles(&path)?;

    let mut published = 0usize;
    for a in &articles {
        match bus.xadd(&cfg.stream_name, &flatten(a)).await {
            Ok(_) => published += 1,
            Err(e) => {
                tracing::error!(error = %e, "publishing article failed");
                counter!("pipeline_errors_total", "stage" => "produce").increment(1);
            }
        }
    }
    tracing::info!(count = published, stream = %cfg.stream_name, bus = bus.name(), "articles published");
    Ok(published)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stream::MemoryBus;
    use serde_json::json;

    #[test]
    fn flatten_stringifies_and_stamps() {
        let a = json!({
            "title": "T",
            "authors": ["a", "b"],
            "top_image": null,
            "score": 3
        });
        let f = flatten(a.as_object().unwrap());
        assert_eq!(f["authors"], r#"["a","b"]"#);
        assert_eq!(f["score"], "3");
        assert!(!f.contains_key("top_image"));
        assert!(f.contains_key("timestamp"));

        let b = json!({"timestamp": "fixed"});
        assert_eq!(flatten(b.as_object().unwrap())["timestamp"], "fixed");
    }

    #[tokio::test]
    async fn publishes_newest_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig::rooted(dir.path());
        let bus = MemoryBus::new();
        assert_eq!(run_once(&cfg, &bus).await.unwrap(), 0);

        fs::create_dir_all(&cfg.data_dir).unwrap();
        let old = cfg.data_dir.join("articles_20240101_000000.json");
        fs::write(&old, r#"[{"title":"old","url":"https://a/1"}]"#).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(
            cfg.data_dir.join("articles_20240102_000000.json"),
            r#"[{"title":"new","url":"https://a/2"},{"title":"new2","url":"https://a/3"}]"#,
        )
        .unwrap();
        fs::write(cfg.data_dir.join("other.json"), "[]").unwrap();

        assert_eq!(run_once(&cfg, &bus).await.unwrap(), 2);
        let msgs = bus.entries(&cfg.stream_name);
        assert_eq!(msgs[0].fields["title"], "new");
    }
}
