// src/pipeline/dashboard.rs
//! Live dashboard over the results stream: JSON snapshot, WebSocket push
//! and a static page.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use chrono::Local;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::stream::{Fields, StreamBus, StreamMessage};

pub const MAX_ARTICLES: usize = 100;
pub const SNAPSHOT_ARTICLES: usize = 10;
pub const HIGH_BUCKET: &str = "High Trust (70-100)";
pub const MEDIUM_BUCKET: &str = "Medium Trust (50-69)";
pub const LOW_BUCKET: &str = "Low Trust (0-49)";

const LISTEN_COUNT: usize = 10;
const LISTEN_BLOCK_MS: u64 = 1_000;
const LISTEN_BACKOFF: Duration = Duration::from_secs(5);

const PAGE: &str = include_str!("../../static/dashboard.html");

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardArticle {
    pub title: String,
    pub source: String,
    pub url: String,
    pub timestamp: String,
    pub collection_time: String,
    pub trust_score: i64,
    pub prediction: String,
}

impl DashboardArticle {
    /// Missing fields get placeholders; a bad `analysis` scores 0.
    pub fn from_fields(fields: &Fields) -> Self {
        let get = |k: &str, default: &str| {
            fields
                .get(k)
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };
        let analysis: Value = fields
            .get("analysis")
            .and_then(|a| serde_json::from_str(a).ok())
            .unwrap_or(Value::Null);
        Self {
            title: get("title", "Untitled"),
            source: get("source", "Unknown"),
            url: get("url", "#"),
            timestamp: fields
                .get("timestamp")
                .cloned()
                .unwrap_or_else(|| Local::now().to_rfc3339()),
            collection_time: get("collection_time", ""),
            trust_score: analysis.get("score").and_then(Value::as_i64).unwrap_or(0),
            prediction: analysis
                .get("prediction")
                .and_then(Value::as_str)
                .unwrap_or("UNKNOWN")
                .to_string(),
        }
    }
}

pub fn bucket(score: i64) -> &'static str {
    if score >= 70 {
        HIGH_BUCKET
    } else if score >= 50 {
        MEDIUM_BUCKET
    } else {
        LOW_BUCKET
    }
}

#[derive(Debug)]
pub struct DashboardState {
    articles: VecDeque<DashboardArticle>,
    sources: BTreeMap<String, u64>,
    trust_scores: BTreeMap<&'static str, u64>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            articles: VecDeque::with_capacity(MAX_ARTICLES),
            sources: BTreeMap::new(),
            trust_scores: BTreeMap::from([(HIGH_BUCKET, 0), (MEDIUM_BUCKET, 0), (LOW_BUCKET, 0)]),
        }
    }
}

impl DashboardState {
    /// Newest first; only the latest `MAX_ARTICLES` are kept. Source and
    /// bucket counts cover everything seen.
    pub fn record(&mut self, a: DashboardArticle) {
        *self.sources.entry(a.source.clone()).or_default() += 1;
        *self.trust_scores.entry(bucket(a.trust_score)).or_default() += 1;
        self.articles.push_front(a);
        self.articles.truncate(MAX_ARTICLES);
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn snapshot(&self) -> Value {
        let recent: Vec<&DashboardArticle> = self.articles.iter().take(SNAPSHOT_ARTICLES).collect();
        let total = self.articles.len();
        let fake = self
            .articles
            .iter()
            .filter(|a| a.prediction == "FAKE")
            .count();
        let sum: i64 = self.articles.iter().map(|a| a.trust_score).sum();
        json!({
            "articles": recent,
            "sources": self.sources,
            "trustScores": self.trust_scores,
            "stats": {
                "totalArticles": total,
                "fakeNewsCount": fake,
                "avgTrustScore": sum as f64 / total.max(1) as f64,
            }
        })
    }
}

#[derive(Clone)]
pub struct Dashboard {
    state: Arc<RwLock<DashboardState>>,
    tx: broadcast::Sender<String>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            state: Arc::new(RwLock::new(DashboardState::default())),
            tx,
        }
    }

    pub fn snapshot(&self) -> Value {
        self.state
            .read()
            .map(|s| s.snapshot())
            .unwrap_or_else(|_| json!({}))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Record a results-stream entry and push it to connected clients.
    pub fn ingest(&self, msg: &StreamMessage) {
        let article = DashboardArticle::from_fields(&msg.fields);
        let update = json!({ "type": "update", "id": msg.id, "data": article }).to_string();
        if let Ok(mut s) = self.state.write() {
            s.record(article);
        }
        // No receivers is fine.
        let _ = self.tx.send(update);
    }

    /// Follow `stream` from the beginning.
    pub fn spawn_listener(&self, bus: Arc<dyn StreamBus>, stream: String) -> JoinHandle<()> {
        let dash = self.clone();
        tokio::spawn(async move {
            tracing::info!(stream = %stream, bus = bus.name(), "dashboard listener started");
            let mut last_id = "0".to_string();
            loop {
                match bus
                    .read_from(&stream, &last_id, LISTEN_COUNT, LISTEN_BLOCK_MS)
                    .await
                {
                    Ok(batch) => {
                        for msg in &batch {
                            last_id = msg.id.clone();
                            tracing::debug!(id = %msg.id, "dashboard message");
                            dash.ingest(msg);
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "dashboard listener error");
                        metrics::counter!("pipeline_errors_total", "stage" => "dashboard").increment(1);
                        tokio::time::sleep(LISTEN_BACKOFF).await;
                    }
                }
            }
        })
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(page))
            .route("/ping", get(ping))
            .route("/api/data", get(data))
            .route("/ws", get(ws))
            .with_state(self.clone())
    }
}

async fn page() -> Html<&'static str> {
    Html(PAGE)
}

async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "Real-time dashboard is running" }))
}

async fn data(State(dash): State<Dashboard>) -> Json<Value> {
    Json(dash.snapshot())
}

async fn ws(State(dash): State<Dashboard>, upgrade: WebSocketUpgrade) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| stream_updates(socket, dash))
}

async fn stream_updates(mut socket: WebSocket, dash: Dashboard) {
    let mut rx = dash.subscribe();
    let init = json!({ "type": "init", "data": dash.snapshot() }).to_string();
    if socket.send(Message::Text(init.into())).await.is_err() {
        return;
    }
    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(text) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "websocket client lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!("websocket client disconnected");
}
