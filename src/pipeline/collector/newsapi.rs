use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Local;
use serde::Deserialize;
use std::time::Duration;

use crate::pipeline::types::{ArticleSource, CollectedArticle};

const TOP_HEADLINES: &str = "https://newsapi.org/v2/top-headlines";

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    articles: Vec<ApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiArticle {
    title: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
    source: Option<ApiSource>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiSource {
    name: Option<String>,
}

/// English top headlines from newsapi.org.
pub struct NewsApi {
    key: String,
    client: reqwest::Client,
    endpoint: String,
}

impl NewsApi {
    /// `None` without a key; the provider is then simply not registered.
    pub fn new(key: Option<&str>, timeout_secs: u64) -> Option<Self> {
        let key = key.map(str::trim).filter(|k| !k.is_empty())?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .ok()?;
        Some(Self {
            key: key.to_string(),
            client,
            endpoint: TOP_HEADLINES.to_string(),
        })
    }

    pub fn parse_body(body: &str) -> Result<Vec<CollectedArticle>> {
        let resp: Response = serde_json::from_str(body).context("parsing newsapi response")?;
        let collected_at = Local::now().to_rfc3339();
        Ok(resp
            .articles
            .into_iter()
            .filter_map(|a| {
                let url = a.url.filter(|u| !u.trim().is_empty())?;
                Some(CollectedArticle {
                    title: a.title.unwrap_or_default(),
                    url,
                    published_date: a.published_at.unwrap_or_default(),
                    source: a.source.and_then(|s| s.name).unwrap_or_default(),
                    source_url: String::new(),
                    collection_time: collected_at.clone(),
                    content: a.description.unwrap_or_default(),
                    ..Default::default()
                })
            })
            .collect())
    }
}

#[async_trait]
impl ArticleSource for NewsApi {
    async fn fetch_latest(&self) -> Result<Vec<CollectedArticle>> {
        tracing::info!("fetching from newsapi");
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("language", "en"), ("apiKey", self.key.as_str())])
            .send()
            .await
            .context("newsapi request")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("newsapi returned status code {}", status.as_u16());
        }
        let body = resp.text().await.context("newsapi body")?;
        Self::parse_body(&body)
    }

    fn name(&self) -> &str {
        "newsapi"
    }
}
