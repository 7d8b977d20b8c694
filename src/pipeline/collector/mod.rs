//! News collection: RSS feeds and NewsAPI, optional full-text enrichment,
//! one JSON file per run.

pub mod newsapi;
pub mod rss;

use anyhow::{Context, Result};
use chrono::Local;
use metrics::counter;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::pipeline::config::PipelineConfig;
use crate::pipeline::types::{ArticleSource, CollectedArticle};
use crate::scraper::{HttpFetcher, Scraper};

pub use newsapi::NewsApi;
pub use rss::RssFeed;

pub const ENRICH_LIMIT: usize = 20;

pub struct Collector {
    sources: Vec<Box<dyn ArticleSource>>,
    scraper: Option<Arc<Scraper>>,
    data_dir: PathBuf,
    enrich_delay: Duration,
}

impl Collector {
    pub fn new(
        sources: Vec<Box<dyn ArticleSource>>,
        scraper: Option<Arc<Scraper>>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sources,
            scraper,
            data_dir: data_dir.into(),
            enrich_delay: Duration::from_secs(1),
        }
    }

    /// Pause between enrichment fetches.
    pub fn with_enrich_delay(mut self, d: Duration) -> Self {
        self.enrich_delay = d;
        self
    }

    /// One RSS source per configured feed, plus NewsAPI when a key is set.
    pub fn from_config(cfg: &PipelineConfig, scraper: Option<Arc<Scraper>>) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(cfg.fetch_timeout_secs)?);
        let mut sources: Vec<Box<dyn ArticleSource>> = cfg
            .feeds
            .iter()
            .map(|f| Box::new(RssFeed::new(f.clone(), fetcher.clone())) as Box<dyn ArticleSource>)
            .collect();
        if let Some(api) = NewsApi::new(cfg.newsapi_key.as_deref(), cfg.fetch_timeout_secs) {
            sources.push(Box::new(api));
        }
        Ok(Self::new(sources, scraper, &cfg.data_dir))
    }

    /// Every source in order; a failing source is logged and skipped.
    pub async fn collect(&self) -> Vec<CollectedArticle> {
        let mut all = Vec::new();
        for s in &self.sources {
            match s.fetch_latest().await {
                Ok(mut v) => {
                    tracing::info!(source = s.name(), count = v.len(), "articles collected");
                    all.append(&mut v);
                }
                Err(e) => {
                    tracing::warn!(error = ?e, source = s.name(), "source error");
                    counter!("pipeline_errors_total", "stage" => "collect").increment(1);
                }
            }
        }
        all
    }

    /// Replace feed snippets with extracted full text where possible.
    pub async fn enrich(&self, article: &mut CollectedArticle) {
        let Some(scraper) = &self.scraper else {
            return;
        };
        match scraper.get_article(&article.url).await {
            Ok(a) => {
                if !a.content.is_empty() {
                    article.content = a.content.clone();
                }
                article.full_text = Some(a.content);
                if !a.authors.is_empty() {
                    article.authors = Some(a.authors);
                }
                if a.summary.is_some() {
                    article.summary = a.summary;
                }
                if !a.keywords.is_empty() {
                    article.keywords = Some(a.keywords);
                }
                if a.top_image.is_some() {
                    article.top_image = a.top_image;
                }
            }
            Err(e) => tracing::warn!(url = %article.url, error = %e, "enrichment failed"),
        }
    }

    /// Collect, enrich the first `ENRICH_LIMIT`, save. Returns the file path
    /// and the number of articles written.
    pub async fn run_once(&self) -> Result<(PathBuf, usize)> {
        let all = self.collect().await;
        tracing::info!(count = all.len(), "collection finished");

        let mut enriched = Vec::with_capacity(all.len().min(ENRICH_LIMIT));
        for (i, mut a) in all.into_iter().take(ENRICH_LIMIT).enumerate() {
            if i > 0 && self.scraper.is_some() && !self.enrich_delay.is_zero() {
                tokio::time::sleep(self.enrich_delay).await;
            }
            self.enrich(&mut a).await;
            enriched.push(a);
        }

        let name = format!("articles_{}.json", Local::now().format("%Y%m%d_%H%M%S"));
        let path = save_articles(&self.data_dir, &name, &enriched)?;
        tracing::info!(path = %path.display(), count = enriched.len(), "articles saved");
        Ok((path, enriched.len()))
    }
}

pub fn save_articles(dir: &Path, name: &str, articles: &[CollectedArticle]) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(name);
    let bytes = serde_json::to_vec_pretty(articles).context("serializing articles")?;
    fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::{HotCredibility, StaticFetcher};
    use async_trait::async_trait;

    struct Canned(Vec<CollectedArticle>);

    #[async_trait]
    impl ArticleSource for Canned {
        async fn fetch_latest(&self) -> Result<Vec<CollectedArticle>> {
            Ok(self.0.clone())
        }
        fn name(&self) -> &str {
            "canned"
        }
    }

    struct Broken;

    #[async_trait]
    impl ArticleSource for Broken {
        async fn fetch_latest(&self) -> Result<Vec<CollectedArticle>> {
            anyhow::bail!("feed down")
        }
        fn name(&self) -> &str {
            "broken"
        }
    }

    fn article(url: &str) -> CollectedArticle {
        CollectedArticle {
            title: "t".into(),
            url: url.into(),
            content: "snippet".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn enriches_first_twenty_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let body = "Officials confirmed the new budget on Monday after a long debate. ".repeat(5);
        let page = format!("<html><body><article><h1>Budget</h1><p>{body}</p></article></body></html>");
        let fetcher = StaticFetcher::new().with_page("https://news.test/0", page);
        let scraper = Scraper::new(
            Arc::new(fetcher),
            None,
            HotCredibility::new(&dir.path().join("cred.json")),
        );

        let items: Vec<CollectedArticle> =
            (0..25).map(|i| article(&format!("https://news.test/{i}"))).collect();
        let collector = Collector::new(
            vec![Box::new(Broken), Box::new(Canned(items))],
            Some(Arc::new(scraper)),
            dir.path().join("data"),
        )
        .with_enrich_delay(Duration::ZERO);

        let (path, n) = collector.run_once().await.unwrap();
        assert_eq!(n, ENRICH_LIMIT);
        let saved: Vec<CollectedArticle> =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert!(saved[0].content.starts_with("Officials confirmed"));
        assert!(saved[0].full_text.is_some());
        // Failed enrichment keeps the feed snippet.
        assert_eq!(saved[1].content, "snippet");
        assert!(saved[1].full_text.is_none());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("articles_"));
    }
}
