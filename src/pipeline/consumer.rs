// src/pipeline/consumer.rs
//! Scores articles from the article stream and publishes the results.
//! Every delivered message is acked once handled, whatever the outcome.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Local;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::config::PipelineConfig;
use super::stream::{Fields, StreamBus, StreamMessage};
use crate::classifier::ModelHandle;
use crate::scoring::{assess, HotReloadWeights, TrustScoreResponse};

pub const READ_COUNT: usize = 1;
pub const READ_BLOCK_MS: u64 = 5_000;
pub const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Whatever turns text into a trust score.
#[async_trait]
pub trait TrustClient: Send + Sync {
    async fn trust_score(&self, text: &str) -> Result<TrustScoreResponse>;
    fn name(&self) -> &'static str;
}

/// `POST {base}/trust-score` on a running API.
pub struct HttpTrustClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTrustClient {
    pub fn new(api_base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/trust-score", api_base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl TrustClient for HttpTrustClient {
    async fn trust_score(&self, text: &str) -> Result<TrustScoreResponse> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("API error: {}", status.as_u16());
        }
        resp.json().await.context("decoding trust score")
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Scores in process with a shared model, no API round trip.
pub struct LocalTrustClient {
    model: ModelHandle,
    weights: Arc<HotReloadWeights>,
}

impl LocalTrustClient {
    pub fn new(model: ModelHandle, weights: Arc<HotReloadWeights>) -> Self {
        Self { model, weights }
    }
}

#[async_trait]
impl TrustClient for LocalTrustClient {
    async fn trust_score(&self, text: &str) -> Result<TrustScoreResponse> {
        let prediction = self
            .model
            .predict(text)
            .ok_or_else(|| anyhow!("models are not loaded"))?;
        let a = assess(text, &prediction, &self.weights.current());
        Ok(TrustScoreResponse::new(a, prediction.label))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleRef {
    pub title: String,
    pub url: String,
    pub source: String,
    pub published_date: String,
    pub collection_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedArticle {
    pub article: ArticleRef,
    pub analysis: TrustScoreResponse,
    pub processed_at: String,
}

impl ProcessedArticle {
    /// Flat fields for the results stream; `analysis` is JSON.
    pub fn to_fields(&self) -> Result<Fields> {
        Ok(Fields::from([
            ("title".to_string(), self.article.title.clone()),
            ("url".to_string(), self.article.url.clone()),
            ("source".to_string(), self.article.source.clone()),
            ("published_date".to_string(), self.article.published_date.clone()),
            ("collection_time".to_string(), self.article.collection_time.clone()),
            ("timestamp".to_string(), self.processed_at.clone()),
            (
                "analysis".to_string(),
                serde_json::to_string(&self.analysis).context("serializing analysis")?,
            ),
        ]))
    }
}

fn field(fields: &Fields, key: &str) -> String {
    fields.get(key).cloned().unwrap_or_default()
}

/// Score one stream entry.
pub async fn process(fields: &Fields, client: &dyn TrustClient) -> Result<ProcessedArticle> {
    let content = fields
        .get("content")
        .filter(|c| !c.trim().is_empty())
        .or_else(|| fields.get("full_text").filter(|c| !c.trim().is_empty()))
        .ok_or_else(|| anyhow!("no content to analyze"))?;

    let analysis = client.trust_score(content).await?;
    Ok(ProcessedArticle {
        article: ArticleRef {
            title: field(fields, "title"),
            url: field(fields, "url"),
            source: field(fields, "source"),
            published_date: field(fields, "published_date"),
            collection_time: field(fields, "collection_time"),
        },
        analysis,
        processed_at: Local::now().to_rfc3339(),
    })
}

pub struct Consumer {
    cfg: PipelineConfig,
    bus: Arc<dyn StreamBus>,
    client: Arc<dyn TrustClient>,
    block_ms: u64,
    backoff: Duration,
}

impl Consumer {
    pub fn new(cfg: PipelineConfig, bus: Arc<dyn StreamBus>, client: Arc<dyn TrustClient>) -> Self {
        Self {
            cfg,
            bus,
            client,
            block_ms: READ_BLOCK_MS,
            backoff: ERROR_BACKOFF,
        }
    }

    pub fn with_timing(mut self, block_ms: u64, backoff: Duration) -> Self {
        self.block_ms = block_ms;
        self.backoff = backoff;
        self
    }

    pub async fn setup(&self) -> Result<()> {
        self.bus
            .ensure_group(&self.cfg.stream_name, &self.cfg.consumer_group)
            .await
    }

    fn save_result(&self, msg_id: &str, result: &ProcessedArticle) -> Result<PathBuf> {
        let dir = &self.cfg.results_dir;
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        let path = dir.join(format!(
            "result_{}_{}.json",
            Local::now().format("%Y%m%d_%H%M%S"),
            msg_id
        ));
        fs::write(&path, serde_json::to_vec_pretty(result)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Process, persist and publish one message, then ack it. Returns whether
    /// processing succeeded.
    pub async fn handle(&self, msg: &StreamMessage) -> bool {
        tracing::info!(id = %msg.id, "processing message");
        let ok = match process(&msg.fields, self.client.as_ref()).await {
            Ok(result) => {
                if let Err(e) = self.save_result(&msg.id, &result) {
                    tracing::error!(id = %msg.id, error = %e, "saving result failed");
                }
                match result.to_fields() {
                    Ok(f) => {
                        if let Err(e) = self.bus.xadd(&self.cfg.results_stream, &f).await {
                            tracing::error!(id = %msg.id, error = %e, "publishing result failed");
                        }
                    }
                    Err(e) => tracing::error!(id = %msg.id, error = %e, "encoding result failed"),
                }
                tracing::info!(id = %msg.id, title = %result.article.title, score = result.analysis.score, "article processed");
                counter!("pipeline_messages_total", "outcome" => "ok").increment(1);
                true
            }
            Err(e) => {
                tracing::warn!(id = %msg.id, error = %e, client = self.client.name(), "article not processed");
                counter!("pipeline_messages_total", "outcome" => "error").increment(1);
                false
            }
        };

        if let Err(e) = self
            .bus
            .ack(&self.cfg.stream_name, &self.cfg.consumer_group, &msg.id)
            .await
        {
            tracing::error!(id = %msg.id, error = %e, "ack failed");
        }
        ok
    }

    /// One read; returns how many messages were handled.
    pub async fn poll_once(&self) -> Result<usize> {
        let batch = self
            .bus
            .read_group(
                &self.cfg.stream_name,
                &self.cfg.consumer_group,
                &self.cfg.consumer_name,
                READ_COUNT,
                self.block_ms,
            )
            .await?;
        for msg in &batch {
            self.handle(msg).await;
        }
        Ok(batch.len())
    }

    /// Runs until the task is dropped.
    pub async fn run(&self) {
        while let Err(e) = self.setup().await {
            tracing::error!(error = %e, "consumer group setup failed; retrying");
            counter!("pipeline_errors_total", "stage" => "consume").increment(1);
            tokio::time::sleep(self.backoff).await;
        }
        tracing::info!(
            stream = %self.cfg.stream_name,
            group = %self.cfg.consumer_group,
            consumer = %self.cfg.consumer_name,
            bus = self.bus.name(),
            "listening for messages"
        );
        loop {
            if let Err(e) = self.poll_once().await {
                tracing::error!(error = %e, "error consuming messages");
                counter!("pipeline_errors_total", "stage" => "consume").increment(1);
                tokio::time::sleep(self.backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::tests::toy_corpus;
    use crate::classifier::{Model, ModelOrigin, TrainParams};
    use crate::pipeline::stream::MemoryBus;

    fn local_client() -> Arc<dyn TrustClient> {
        let (docs, labels) = toy_corpus();
        let model = Model::fit(&docs, &labels, &TrainParams::default()).unwrap();
        Arc::new(LocalTrustClient::new(
            ModelHandle::with_model(model, ModelOrigin::Local),
            Arc::new(HotReloadWeights::new(None)),
        ))
    }

    fn article(content: &str) -> Fields {
        Fields::from([
            ("collection_time".to_string(), "2025-06-10T13:00:00+00:00".to_string()),
            ("title".to_string(), "Budget passes".to_string()),
            ("url".to_string(), "https://news.test/1".to_string()),
            ("source".to_string(), "news.test".to_string()),
            ("content".to_string(), content.to_string()),
        ])
    }

    #[tokio::test]
    async fn content_falls_back_to_full_text() {
        let client = local_client();
        let mut f = article("");
        assert!(process(&f, client.as_ref()).await.is_err());
        f.insert(
            "full_text".into(),
            "The committee approved the budget, according to officials.".into(),
        );
        let r = process(&f, client.as_ref()).await.unwrap();
        assert_eq!(r.article.source, "news.test");
        assert!((0..=100).contains(&r.analysis.score));
    }

    #[tokio::test]
    async fn every_message_is_acked() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig::rooted(dir.path());
        let bus = Arc::new(MemoryBus::new());
        let consumer = Consumer::new(cfg.clone(), bus.clone(), local_client())
            .with_timing(0, Duration::from_millis(1));
        consumer.setup().await.unwrap();

        bus.xadd(&cfg.stream_name, &article("Officials report the budget vote passed."))
            .await
            .unwrap();
        bus.xadd(&cfg.stream_name, &article("")).await.unwrap();

        assert_eq!(consumer.poll_once().await.unwrap(), 1);
        assert_eq!(consumer.poll_once().await.unwrap(), 1);
        assert_eq!(consumer.poll_once().await.unwrap(), 0);

        assert_eq!(bus.pending_count(&cfg.stream_name, &cfg.consumer_group), 0);
        let results = bus.entries(&cfg.results_stream);
        assert_eq!(results.len(), 1);
        let analysis: TrustScoreResponse =
            serde_json::from_str(&results[0].fields["analysis"]).unwrap();
        assert!((0..=100).contains(&analysis.score));
        assert_eq!(results[0].fields["collection_time"], "2025-06-10T13:00:00+00:00");
        assert_eq!(results[0].fields["source"], "news.test");
        assert_eq!(fs::read_dir(&cfg.results_dir).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn unloaded_model_is_an_error_not_a_panic() {
        let client = LocalTrustClient::new(ModelHandle::new(), Arc::new(HotReloadWeights::new(None)));
        assert!(client.trust_score("text").await.is_err());
    }
}
