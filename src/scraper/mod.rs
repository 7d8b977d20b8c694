//! Article extraction from news URLs.
//!
//! `Scraper::get_article` validates the URL, serves a fresh cache entry if
//! there is one, otherwise fetches and extracts, then decorates the result
//! with source credibility and reading aids.

pub mod cache;
pub mod credibility;
pub mod extract;
pub mod fetch;
pub mod metadata;
pub mod url;

use anyhow::{bail, Result};
use chrono::Utc;
use select::document::Document;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use cache::ArticleCache;
pub use credibility::{CredibilityTable, HotCredibility};
pub use fetch::{Fetcher, HttpFetcher, StaticFetcher};
pub use url::{domain_of, is_valid_url, normalize_input_url};

use crate::config::AppConfig;

const WORDS_PER_MINUTE: f64 = 225.0;
const SUMMARY_MIN_CHARS: usize = 1000;

/// Extraction result as stored in the cache, before decoration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedArticle {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub publish_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub top_image: Option<String>,
    pub extraction_method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleContent {
    pub title: String,
    pub content: String,
    pub source: String,
    pub source_credibility: u8,
    pub extraction_method: String,
    pub url: String,
    pub is_known_fake_news: bool,
    pub reading_time_minutes: u64,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_image: Option<String>,
}

/// Run the extraction strategies and merge page metadata.
pub fn parse_article(html: &str) -> Option<ExtractedArticle> {
    let doc = Document::from(html);
    let (method, content) = extract::extract_main_text(&doc)?;
    let md = metadata::extract_metadata(&doc);

    let title = extract::heading_title(&doc)
        .or_else(|| md.title.clone())
        .or_else(|| extract::document_title(&doc))
        .unwrap_or_default();

    Some(ExtractedArticle {
        title,
        content,
        authors: md.authors,
        publish_date: md.published,
        description: md.description,
        section: md.section,
        keywords: md.keywords,
        top_image: md.image,
        extraction_method: method.to_string(),
    })
}

/// First three `.`-separated sentences, only for long content.
pub fn summarize(content: &str) -> Option<String> {
    if content.chars().count() <= SUMMARY_MIN_CHARS {
        return None;
    }
    let head: Vec<&str> = content.split('.').take(3).collect();
    Some(format!("{}.", head.join(".")).trim().to_string())
}

pub fn reading_time_minutes(content: &str) -> u64 {
    let words = content.split_whitespace().count() as f64;
    ((words / WORDS_PER_MINUTE).round() as u64).max(1)
}

pub fn decorate(url: &str, a: ExtractedArticle, table: &CredibilityTable) -> ArticleContent {
    let domain = domain_of(url);
    ArticleContent {
        source_credibility: table.credibility(&domain),
        is_known_fake_news: table.is_known_fake(&domain),
        summary: summarize(&a.content),
        reading_time_minutes: reading_time_minutes(&a.content),
        timestamp: Utc::now().to_rfc3339(),
        url: url.to_string(),
        source: domain,
        title: a.title,
        content: a.content,
        extraction_method: a.extraction_method,
        authors: a.authors,
        publish_date: a.publish_date,
        description: a.description,
        section: a.section,
        keywords: a.keywords,
        top_image: a.top_image,
    }
}

pub struct Scraper {
    fetcher: Arc<dyn Fetcher>,
    cache: Option<ArticleCache>,
    credibility: HotCredibility,
}

impl Scraper {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        cache: Option<ArticleCache>,
        credibility: HotCredibility,
    ) -> Self {
        Self {
            fetcher,
            cache,
            credibility,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(HttpFetcher::new(cfg.fetch_timeout_secs)?),
            Some(ArticleCache::new(&cfg.cache_dir)),
            HotCredibility::new(&cfg.credibility_path),
        ))
    }

    pub fn credibility(&self) -> Arc<CredibilityTable> {
        self.credibility.current()
    }

    pub async fn get_article(&self, url: &str) -> Result<ArticleContent> {
        if !is_valid_url(url) {
            bail!("invalid url: {url}");
        }

        let cached = match &self.cache {
            Some(c) => c.get(url).await,
            None => None,
        };
        let extracted = match cached {
            Some(a) => {
                tracing::debug!(url = %url, "article served from cache");
                a
            }
            None => {
                let html = self.fetcher.fetch(url).await?;
                let Some(a) = parse_article(&html) else {
                    bail!("no extraction strategy produced enough text for {url}");
                };
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.put(url, &a).await {
                        tracing::warn!(url = %url, error = %e, "article cache write failed");
                    }
                }
                tracing::info!(url = %url, method = %a.extraction_method, fetcher = self.fetcher.name(), "article extracted");
                a
            }
        };

        Ok(decorate(url, extracted, &self.credibility()))
    }
}
