// src/lib.rs
// Public library surface for the server, the pipeline/mlops runners and integration tests.

pub mod api;
pub mod auth;
pub mod classifier;
pub mod config;
pub mod error;
pub mod metrics;
pub mod mlops;
pub mod notify;
pub mod pipeline;
pub mod scoring;
pub mod scraper;
pub mod store;

pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`;
/// `LOG_FORMAT=json` switches to JSON lines. Safe to call twice.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
