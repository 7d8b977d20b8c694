// src/pipeline/mod.rs
//! Ingestion pipeline: collector -> producer -> stream -> consumer ->
//! results stream -> dashboard.

pub mod collector;
pub mod config;
pub mod consumer;
pub mod dashboard;
pub mod deploy_check;
pub mod producer;
pub mod scheduler;
pub mod stream;
pub mod types;

use once_cell::sync::OnceCell;
use regex::Regex;

pub use config::PipelineConfig;
pub use stream::{Fields, MemoryBus, RedisBus, StreamBus, StreamMessage};
pub use types::{ArticleSource, CollectedArticle};

/// Feed text cleanup: decode entities, strip tags, ASCII quotes, collapse
/// whitespace.
pub fn normalize_text(s: &str) -> String {
    static RE_TAGS: OnceCell<Option<Regex>> = OnceCell::new();
    static RE_WS: OnceCell<Option<Regex>> = OnceCell::new();

    let mut out = html_escape::decode_html_entities(s).to_string();

    if let Some(re) = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").ok()) {
        out = re.replace_all(&out, " ").into_owned();
    }
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    if let Some(re) = RE_WS.get_or_init(|| Regex::new(r"\s+").ok()) {
        out = re.replace_all(&out, " ").into_owned();
    }
    out.trim().to_string()
}
