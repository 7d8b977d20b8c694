// src/pipeline/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One article as written to `data/articles_<ts>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectedArticle {
    pub title: String,
    pub url: String,
    pub published_date: String,
    pub source: String,
    pub source_url: String,
    pub collection_time: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_image: Option<String>,
}

#[async_trait::async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<CollectedArticle>>;
    fn name(&self) -> &str;
}
