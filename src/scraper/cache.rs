use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use super::ExtractedArticle;

#[derive(Debug, Serialize, Deserialize)]
struct CachedArticle {
    #[serde(flatten)]
    article: ExtractedArticle,
    cache_time: DateTime<Utc>,
}

/// Extracted articles on disk, one JSON file per URL, valid for `ttl`.
#[derive(Debug, Clone)]
pub struct ArticleCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ArticleCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ttl: Duration::hours(24),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        self.dir.join(format!("{digest:x}.json"))
    }

    pub async fn get(&self, url: &str) -> Option<ExtractedArticle> {
        self.get_at(url, Utc::now()).await
    }

    pub async fn get_at(&self, url: &str, now: DateTime<Utc>) -> Option<ExtractedArticle> {
        let path = self.path_for(url);
        let raw = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice::<CachedArticle>(&raw) {
            Ok(c) if now - c.cache_time <= self.ttl => Some(c.article),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "unreadable cache entry");
                None
            }
        }
    }

    pub async fn put(&self, url: &str, article: &ExtractedArticle) -> Result<()> {
        self.put_at(url, article, Utc::now()).await
    }

    pub async fn put_at(
        &self,
        url: &str,
        article: &ExtractedArticle,
        at: DateTime<Utc>,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let entry = CachedArticle {
            article: article.clone(),
            cache_time: at,
        };
        let path = self.path_for(url);
        tokio::fs::write(&path, serde_json::to_vec_pretty(&entry)?)
            .await
            .with_context(|| format!("writing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExtractedArticle {
        ExtractedArticle {
            title: "T".into(),
            content: "body".into(),
            extraction_method: "article".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn hit_then_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArticleCache::new(dir.path().join("cache"));
        let url = "https://example.com/a";
        assert!(cache.get(url).await.is_none());

        let t0 = Utc::now();
        cache.put_at(url, &sample(), t0).await.unwrap();
        assert_eq!(
            cache.get_at(url, t0 + Duration::hours(23)).await,
            Some(sample())
        );
        assert_eq!(cache.get_at(url, t0 + Duration::hours(25)).await, None);
        assert!(cache.get("https://example.com/b").await.is_none());
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArticleCache::new(dir.path());
        std::fs::write(cache.path_for("u"), b"{").unwrap();
        assert!(cache.get("u").await.is_none());
    }
}
