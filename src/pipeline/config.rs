// src/pipeline/config.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{env_or, env_parse};

const ENV_FEEDS_PATH: &str = "PIPELINE_FEEDS_PATH";

/// Built-in feed list, used when no feeds file is present.
pub const DEFAULT_FEEDS: &[&str] = &[
    "http://rss.cnn.com/rss/cnn_topstories.rss",
    "https://www.nytimes.com/svc/collections/v1/publish/https://www.nytimes.com/section/world/rss.xml",
    "https://feeds.bbci.co.uk/news/world/rss.xml",
    "https://www.theguardian.com/world/rss",
    "https://www.washingtonpost.com/rss/world",
    "https://feeds.feedburner.com/TechCrunch",
    "https://www.wired.com/feed/rss",
    "https://www.sciencedaily.com/rss/all.xml",
    "https://www.sciencenews.org/feed",
    "https://www.infowars.com/feed/custom_feed_rss",
    "https://www.breitbart.com/feed/",
];

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_db: i64,
    pub redis_password: Option<String>,
    pub stream_name: String,
    pub results_stream: String,
    pub consumer_group: String,
    pub consumer_name: String,
    pub api_base_url: String,
    pub newsapi_key: Option<String>,
    pub collector_interval_minutes: u64,
    pub producer_interval_minutes: u64,
    pub dashboard_port: u16,
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
    pub fetch_timeout_secs: u64,
    pub feeds: Vec<String>,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let feeds = match load_feeds_default() {
            Ok(f) if !f.is_empty() => f,
            Ok(_) => default_feeds(),
            Err(e) => {
                tracing::warn!(error = %e, "feeds file unusable; using built-in feeds");
                default_feeds()
            }
        };
        let password = env_or("REDIS_PASSWORD", "");
        let key = env_or("NEWSAPI_KEY", "");

        Self {
            redis_host: env_or("REDIS_HOST", "localhost"),
            redis_port: env_parse("REDIS_PORT", 6379),
            redis_db: env_parse("REDIS_DB", 0),
            redis_password: (!password.is_empty()).then_some(password),
            stream_name: env_or("REDIS_STREAM_NAME", "news_articles"),
            results_stream: env_or("REDIS_RESULTS_STREAM", "news_analyses"),
            consumer_group: env_or("REDIS_CONSUMER_GROUP", "news_processors"),
            consumer_name: env_or(
                "REDIS_CONSUMER_NAME",
                &format!("consumer-{}", std::process::id()),
            ),
            api_base_url: env_or("API_BASE_URL", "http://localhost:8000"),
            newsapi_key: (!key.is_empty()).then_some(key),
            collector_interval_minutes: env_parse("COLLECTOR_INTERVAL_MINUTES", 30),
            producer_interval_minutes: env_parse("PRODUCER_INTERVAL_MINUTES", 5),
            dashboard_port: env_parse("PORT", 8080),
            data_dir: PathBuf::from(env_or("PIPELINE_DATA_DIR", "data")),
            results_dir: PathBuf::from(env_or("PIPELINE_RESULTS_DIR", "results")),
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS", 10),
            feeds,
        }
    }

    /// Local defaults with files under `root`.
    pub fn rooted(root: &Path) -> Self {
        Self {
            redis_host: "localhost".into(),
            redis_port: 6379,
            redis_db: 0,
            redis_password: None,
            stream_name: "news_articles".into(),
            results_stream: "news_analyses".into(),
            consumer_group: "news_processors".into(),
            consumer_name: "consumer-test".into(),
            api_base_url: "http://localhost:8000".into(),
            newsapi_key: None,
            collector_interval_minutes: 30,
            producer_interval_minutes: 5,
            dashboard_port: 8080,
            data_dir: root.join("data"),
            results_dir: root.join("results"),
            fetch_timeout_secs: 10,
            feeds: default_feeds(),
        }
    }

    /// `redis://[:password@]host:port/db`
    pub fn redis_url(&self) -> String {
        let auth = self
            .redis_password
            .as_deref()
            .map(|p| format!(":{p}@"))
            .unwrap_or_default();
        format!(
            "redis://{auth}{}:{}/{}",
            self.redis_host, self.redis_port, self.redis_db
        )
    }

    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}

pub fn default_feeds() -> Vec<String> {
    DEFAULT_FEEDS.iter().map(|s| s.to_string()).collect()
}

/// Load feeds from an explicit path. TOML (`feeds = [..]`) or a JSON array.
pub fn load_feeds_from(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feeds from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_feeds(&content, ext.as_str())
}

/// Env var first, then `config/feeds.toml`, then `config/feeds.json`.
/// Empty when none exists.
pub fn load_feeds_default() -> Result<Vec<String>> {
    if let Ok(p) = std::env::var(ENV_FEEDS_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_feeds_from(&pb);
        }
        return Err(anyhow!("{ENV_FEEDS_PATH} points to non-existent path"));
    }
    for candidate in ["config/feeds.toml", "config/feeds.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_feeds_from(&p);
        }
    }
    Ok(Vec::new())
}

fn parse_feeds(s: &str, hint_ext: &str) -> Result<Vec<String>> {
    if hint_ext == "json" {
        return parse_json(s).or_else(|_| parse_toml(s));
    }
    parse_toml(s).or_else(|_| parse_json(s))
}

fn parse_toml(s: &str) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct FeedsToml {
        feeds: Vec<String>,
    }
    let v: FeedsToml = toml::from_str(s)?;
    Ok(clean_list(v.feeds))
}

fn parse_json(s: &str) -> Result<Vec<String>> {
    let v: Vec<String> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trimmed, non-empty, first occurrence wins; order kept.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn toml_and_json_feed_lists() {
        let toml = r#"feeds = [" https://a/rss ", "", "https://b/rss", "https://a/rss"]"#;
        assert_eq!(
            parse_feeds(toml, "toml").unwrap(),
            vec!["https://a/rss".to_string(), "https://b/rss".to_string()]
        );
        let json = r#"["https://c/feed", "  "]"#;
        assert_eq!(
            parse_feeds(json, "json").unwrap(),
            vec!["https://c/feed".to_string()]
        );
        assert!(parse_feeds("feeds = 3", "toml").is_err());
    }

    #[test]
    fn redis_url_carries_password_and_db() {
        let mut cfg = PipelineConfig::rooted(Path::new("/tmp"));
        assert_eq!(cfg.redis_url(), "redis://localhost:6379/0");
        cfg.redis_password = Some("s3cret".into());
        cfg.redis_db = 2;
        assert_eq!(cfg.redis_url(), "redis://:s3cret@localhost:6379/2");
    }

    #[serial_test::serial]
    #[test]
    fn feeds_file_overrides_builtin_list() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_FEEDS_PATH);

        assert!(load_feeds_default().unwrap().is_empty());
        assert_eq!(PipelineConfig::from_env().feeds.len(), DEFAULT_FEEDS.len());

        fs::create_dir_all("config").unwrap();
        fs::write("config/feeds.toml", r#"feeds = ["https://x/rss"]"#).unwrap();
        assert_eq!(PipelineConfig::from_env().feeds, vec!["https://x/rss".to_string()]);

        env::set_var(ENV_FEEDS_PATH, tmp.path().join("missing.toml"));
        assert!(load_feeds_default().is_err());
        env::remove_var(ENV_FEEDS_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
