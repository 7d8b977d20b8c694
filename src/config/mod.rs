// src/config/mod.rs
//! Service configuration resolved from the environment (after `.env` is loaded).

use std::path::PathBuf;
use std::str::FromStr;

const DEV_JWT_SECRET: &str = "trust-verify-dev-secret-change-me";

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:8080,https://trustverify.vercel.app,https://trust-verify-sandy.vercel.app";

/// Read `key`, falling back to `default` when unset or blank.
pub fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

/// Read and parse `key`; unparsable values fall back to `default`.
pub fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// `1|true|yes|on` (case-insensitive) are truthy.
pub fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub static_dir: PathBuf,
    pub model_path: PathBuf,
    pub trust_weights_path: PathBuf,
    pub credibility_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub bcrypt_cost: u32,
    pub cors_origins: Vec<String>,
    pub fetch_timeout_secs: u64,
    /// Prefix for password-reset links; empty keeps them relative.
    pub frontend_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(s) if !s.trim().is_empty() => s,
            _ => {
                tracing::warn!("JWT_SECRET not set; using development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        Self {
            data_dir: PathBuf::from(env_or("DATA_DIR", "data")),
            cache_dir: PathBuf::from(env_or("ARTICLE_CACHE_DIR", "cache")),
            static_dir: PathBuf::from(env_or("STATIC_DIR", "static")),
            model_path: PathBuf::from(env_or("MODEL_PATH", "model/model.json")),
            trust_weights_path: PathBuf::from(env_or(
                "TRUST_WEIGHTS_PATH",
                "config/trust_weights.json",
            )),
            credibility_path: PathBuf::from(env_or(
                "SOURCE_CREDIBILITY_PATH",
                "config/source_credibility.json",
            )),
            jwt_secret,
            token_ttl_minutes: env_parse("ACCESS_TOKEN_EXPIRE_MINUTES", 30),
            bcrypt_cost: env_parse("BCRYPT_COST", bcrypt::DEFAULT_COST),
            cors_origins: parse_origins(&env_or("CORS_ORIGINS", DEFAULT_CORS_ORIGINS)),
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS", 10),
            frontend_url: env_or("FRONTEND_URL", ""),
        }
    }

    /// Everything rooted under `root`; used by tests and throwaway runs.
    pub fn rooted(root: &std::path::Path) -> Self {
        Self {
            data_dir: root.join("data"),
            cache_dir: root.join("cache"),
            static_dir: root.join("static"),
            model_path: root.join("model/model.json"),
            trust_weights_path: root.join("config/trust_weights.json"),
            credibility_path: root.join("config/source_credibility.json"),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_minutes: 30,
            bcrypt_cost: 4,
            cors_origins: vec!["*".into()],
            fetch_timeout_secs: 10,
            frontend_url: String::new(),
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_split_and_trimmed() {
        let v = parse_origins(" http://a , ,http://b");
        assert_eq!(v, vec!["http://a".to_string(), "http://b".to_string()]);
    }

    #[serial_test::serial]
    #[test]
    fn env_helpers_fall_back() {
        std::env::remove_var("TV_TEST_NUM");
        assert_eq!(env_parse("TV_TEST_NUM", 7u32), 7);
        std::env::set_var("TV_TEST_NUM", "nope");
        assert_eq!(env_parse("TV_TEST_NUM", 7u32), 7);
        std::env::set_var("TV_TEST_NUM", " 9 ");
        assert_eq!(env_parse("TV_TEST_NUM", 7u32), 9);
        std::env::remove_var("TV_TEST_NUM");

        std::env::set_var("TV_TEST_FLAG", "Yes");
        assert!(env_flag("TV_TEST_FLAG", false));
        std::env::remove_var("TV_TEST_FLAG");
        assert!(!env_flag("TV_TEST_FLAG", false));
    }
}
