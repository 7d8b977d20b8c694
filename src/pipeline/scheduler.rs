// src/pipeline/scheduler.rs
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::collector::Collector;
use super::config::PipelineConfig;
use super::producer;
use super::stream::StreamBus;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub collector_every: Duration,
    pub producer_every: Duration,
}

impl SchedulerCfg {
    pub fn from_pipeline(cfg: &PipelineConfig) -> Self {
        Self {
            collector_every: Duration::from_secs(cfg.collector_interval_minutes.max(1) * 60),
            producer_every: Duration::from_secs(cfg.producer_interval_minutes.max(1) * 60),
        }
    }
}

pub struct SchedulerHandles {
    pub collector: JoinHandle<()>,
    pub producer: JoinHandle<()>,
}

impl SchedulerHandles {
    pub fn abort(&self) {
        self.collector.abort();
        self.producer.abort();
    }
}

/// Collector and producer on their own intervals; both fire immediately.
pub fn spawn(
    sched: SchedulerCfg,
    collector: Arc<Collector>,
    cfg: PipelineConfig,
    bus: Arc<dyn StreamBus>,
) -> SchedulerHandles {
    let collector_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sched.collector_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            tracing::info!("running news collector");
            match collector.run_once().await {
                Ok((path, n)) => {
                    tracing::info!(path = %path.display(), count = n, "collector run finished");
                    gauge!("pipeline_last_collect_ts").set(chrono::Utc::now().timestamp() as f64);
                }
                Err(e) => {
                    tracing::error!(error = ?e, "collector run failed");
                    counter!("pipeline_errors_total", "stage" => "collect").increment(1);
                }
            }
        }
    });

    let producer_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sched.producer_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            tracing::info!("running redis producer");
            match producer::run_once(&cfg, bus.as_ref()).await {
                Ok(n) => tracing::info!(count = n, "producer run finished"),
                Err(e) => {
                    tracing::error!(error = ?e, "producer run failed");
                    counter!("pipeline_errors_total", "stage" => "produce").increment(1);
                }
            }
        }
    });

    SchedulerHandles {
        collector: collector_task,
        producer: producer_task,
    }
}
