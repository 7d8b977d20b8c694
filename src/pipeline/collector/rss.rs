use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use metrics::counter;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::sync::Arc;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

use crate::pipeline::normalize_text;
use crate::pipeline::types::{ArticleSource, CollectedArticle};
use crate::scraper::{domain_of, Fetcher};

pub const ITEMS_PER_FEED: usize = 10;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// RFC 2822 feed dates become RFC 3339 (UTC); anything else is kept verbatim.
pub fn normalize_pub_date(raw: &str) -> String {
    let raw = raw.trim();
    OffsetDateTime::parse(raw, &Rfc2822)
        .ok()
        .and_then(|dt| dt.to_offset(UtcOffset::UTC).format(&Rfc3339).ok())
        .unwrap_or_else(|| raw.to_string())
}

pub struct RssFeed {
    url: String,
    fetcher: Arc<dyn Fetcher>,
}

impl RssFeed {
    pub fn new(url: impl Into<String>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            url: url.into(),
            fetcher,
        }
    }

    /// First `ITEMS_PER_FEED` items; items without a link are skipped.
    pub fn parse_items(&self, xml: &str) -> Result<Vec<CollectedArticle>> {
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing rss xml from {}", self.url))?;

        let source = domain_of(&self.url);
        let collected_at = Local::now().to_rfc3339();
        let out = rss
            .channel
            .item
            .into_iter()
            .take(ITEMS_PER_FEED)
            .filter_map(|it| {
                let url = it.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())?;
                Some(CollectedArticle {
                    title: normalize_text(it.title.as_deref().unwrap_or_default()),
                    url,
                    published_date: it
                        .pub_date
                        .as_deref()
                        .map(normalize_pub_date)
                        .unwrap_or_default(),
                    source: source.clone(),
                    source_url: self.url.clone(),
                    collection_time: collected_at.clone(),
                    content: normalize_text(it.description.as_deref().unwrap_or_default()),
                    ..Default::default()
                })
            })
            .collect();
        Ok(out)
    }
}

#[async_trait]
impl ArticleSource for RssFeed {
    async fn fetch_latest(&self) -> Result<Vec<CollectedArticle>> {
        tracing::info!(feed = %self.url, "fetching rss feed");
        let body = match self.fetcher.fetch(&self.url).await {
            Ok(b) => b,
            Err(e) => {
                counter!("pipeline_errors_total", "stage" => "collect").increment(1);
                return Err(e).context("rss fetch");
            }
        };
        self.parse_items(&body)
    }

    fn name(&self) -> &str {
        &self.url
    }
}

/// HTML entities that are not valid XML and would fail the parser.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::StaticFetcher;

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>World</title>
<item><title>Summit&nbsp;opens</title><link>https://www.bbc.co.uk/news/1</link>
<pubDate>Tue, 10 Jun 2025 14:30:00 +0200</pubDate>
<description><![CDATA[<p>Leaders <b>meet</b> today.</p>]]></description></item>
<item><title>No link here</title></item>
</channel></rss>"#;

    fn feed() -> RssFeed {
        RssFeed::new(
            "https://feeds.bbci.co.uk/news/world/rss.xml",
            Arc::new(StaticFetcher::new()),
        )
    }

    #[test]
    fn items_without_link_are_dropped() {
        let items = feed().parse_items(FEED).unwrap();
        assert_eq!(items.len(), 1);
        let a = &items[0];
        assert_eq!(a.title, "Summit opens");
        assert_eq!(a.source, "feeds.bbci.co.uk");
        assert_eq!(a.content, "Leaders meet today.");
        assert_eq!(a.published_date, "2025-06-10T12:30:00Z");
    }

    #[test]
    fn at_most_ten_items_per_feed() {
        let mut xml = String::from("<rss><channel>");
        for i in 0..15 {
            xml.push_str(&format!(
                "<item><title>t{i}</title><link>https://x.test/{i}</link></item>"
            ));
        }
        xml.push_str("</channel></rss>");
        assert_eq!(feed().parse_items(&xml).unwrap().len(), ITEMS_PER_FEED);
    }

    #[test]
    fn unparsable_dates_are_kept() {
        assert_eq!(normalize_pub_date(" yesterday "), "yesterday");
    }

    #[tokio::test]
    async fn fetch_errors_surface() {
        assert!(feed().fetch_latest().await.is_err());
    }
}
