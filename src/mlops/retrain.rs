//! Drift-triggered retraining and its periodic scheduler.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{drift, train, Mlops};
use crate::classifier::{ModelHandle, ModelOrigin};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrainResult {
    pub drift_detected: bool,
    pub retrained: bool,
    pub run_id: Option<String>,
    pub metrics: Option<BTreeMap<String, f64>>,
    pub timestamp: String,
}

/// Check drift with the live model and retrain when drift is found (or
/// always, with `force`). A new model is swapped into `handle`. Failures
/// are logged and reported as "not retrained".
pub fn retraining_flow(mlops: &Mlops, handle: &ModelHandle, force: bool) -> RetrainResult {
    let mut result = RetrainResult {
        timestamp: Utc::now().to_rfc3339(),
        ..Default::default()
    };

    if !force {
        let live = handle.current();
        match drift::detect(&mlops.config, None, None, live.as_deref()) {
            Ok(Some(report)) => result.drift_detected = report.drift_detected,
            Ok(None) => tracing::warn!("drift detection skipped; no processed data yet"),
            Err(e) => {
                tracing::error!(error = %e, "drift detection failed");
                return result;
            }
        }
        if !result.drift_detected {
            tracing::info!("no significant drift detected");
            return result;
        }
        tracing::info!("concept drift detected; retraining");
    } else {
        tracing::info!("forced retraining");
    }

    ::metrics::counter!("retrain_runs_total").increment(1);
    match train::train_and_log(&mlops.config, &mlops.registry, true, true) {
        Ok(outcome) => {
            tracing::info!(
                run_id = %outcome.run_id,
                accuracy = outcome.metrics.accuracy,
                f1 = outcome.metrics.f1,
                "model retrained"
            );
            result.retrained = true;
            result.run_id = Some(outcome.run_id);
            result.metrics = Some(outcome.metrics.to_map());
            handle.swap(outcome.model, ModelOrigin::Registry);
        }
        Err(e) => tracing::error!(error = %e, "model retraining failed"),
    }
    result
}

/// Runs the flow on the blocking pool.
pub async fn run_flow(mlops: Arc<Mlops>, handle: ModelHandle, force: bool) -> RetrainResult {
    let fallback = RetrainResult {
        timestamp: Utc::now().to_rfc3339(),
        ..Default::default()
    };
    tokio::task::spawn_blocking(move || retraining_flow(&mlops, &handle, force))
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "retraining task panicked");
            fallback
        })
}

/// Background loop: first check after one full `every`, then every `every`.
pub fn spawn_scheduler(mlops: Arc<Mlops>, handle: ModelHandle, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval_at(Instant::now() + every, every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(every_secs = every.as_secs(), "retraining scheduler started");
        loop {
            tick.tick().await;
            tracing::info!("running scheduled retraining check");
            let r = run_flow(mlops.clone(), handle.clone(), false).await;
            if r.retrained {
                tracing::info!(run_id = ?r.run_id, "scheduled retraining completed");
            } else {
                tracing::info!("no retraining needed");
            }
        }
    })
}
