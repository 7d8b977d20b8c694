// src/pipeline/deploy_check.rs
//! Pre-deployment sanity check: Redis reachable and the API healthy.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::time::Duration;

use super::config::PipelineConfig;
use super::stream::{RedisBus, StreamBus};

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeployReport {
    pub checks: Vec<CheckResult>,
}

impl DeployReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.ok)
    }
}

pub async fn check_redis(bus: &dyn StreamBus) -> CheckResult {
    match bus.ping().await {
        Ok(()) => CheckResult {
            name: "redis",
            ok: true,
            detail: "ping successful".into(),
        },
        Err(e) => CheckResult {
            name: "redis",
            ok: false,
            detail: format!("{e:#}"),
        },
    }
}

/// `GET {base}/health` must answer 2xx with `status == "healthy"`.
pub async fn check_api(api_base_url: &str) -> CheckResult {
    let url = format!("{}/health", api_base_url.trim_end_matches('/'));
    let outcome = async {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building http client")?;
        let resp = client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?;
        let body: Value = resp.json().await.context("health body is not json")?;
        match body.get("status").and_then(Value::as_str) {
            Some("healthy") => Ok::<(), anyhow::Error>(()),
            other => bail!("unexpected health status: {other:?}"),
        }
    }
    .await;

    match outcome {
        Ok(()) => CheckResult {
            name: "api",
            ok: true,
            detail: format!("{url} healthy"),
        },
        Err(e) => CheckResult {
            name: "api",
            ok: false,
            detail: format!("{e:#}"),
        },
    }
}

pub async fn run(cfg: &PipelineConfig) -> DeployReport {
    let redis = match RedisBus::connect(&cfg.redis_url()).await {
        Ok(bus) => check_redis(&bus).await,
        Err(e) => CheckResult {
            name: "redis",
            ok: false,
            detail: format!("{e:#}"),
        },
    };
    let api = check_api(cfg.api_base()).await;

    let report = DeployReport {
        checks: vec![redis, api],
    };
    for c in &report.checks {
        if c.ok {
            tracing::info!(check = c.name, detail = %c.detail, "check passed");
        } else {
            tracing::error!(check = c.name, detail = %c.detail, "check failed");
        }
    }
    report
}
