//! Ingestion pipeline runner: collect, produce, consume, dashboard.
//!
//! Usage:
//!   pipeline collect
//!   pipeline all

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;

use trust_verify::config::AppConfig;
use trust_verify::metrics::Metrics;
use trust_verify::pipeline::collector::Collector;
use trust_verify::pipeline::consumer::{Consumer, HttpTrustClient};
use trust_verify::pipeline::dashboard::Dashboard;
use trust_verify::pipeline::{deploy_check, producer, scheduler, PipelineConfig, RedisBus, StreamBus};
use trust_verify::scraper::Scraper;

#[derive(Parser, Debug)]
#[command(name = "pipeline")]
#[command(about = "Trust Verify news ingestion pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch feeds once and save an articles file
    Collect,
    /// Push the newest articles file onto the stream
    Produce,
    /// Score stream messages until stopped
    Consume,
    /// Serve the live dashboard
    Dashboard,
    /// Collector and producer on their intervals
    Schedule,
    /// Check Redis and the API before deploying
    Check,
    /// Scheduler, consumer and dashboard in one process
    All,
}

fn collector(cfg: &PipelineConfig) -> Result<Collector> {
    let scraper = match Scraper::from_config(&AppConfig::from_env()) {
        Ok(s) => Some(Arc::new(s)),
        Err(e) => {
            tracing::warn!(error = %e, "scraper unavailable; articles will not be enriched");
            None
        }
    };
    Collector::from_config(cfg, scraper)
}

async fn bus(cfg: &PipelineConfig) -> Result<Arc<dyn StreamBus>> {
    let bus = RedisBus::connect(&cfg.redis_url()).await?;
    Ok(Arc::new(bus))
}

/// Buses for `all`. The consumer and dashboard block on reads, so each gets
/// its own connection; the producer gets a third.
struct AllBuses {
    producer: Arc<dyn StreamBus>,
    consumer: Arc<dyn StreamBus>,
    dashboard: Arc<dyn StreamBus>,
}

impl AllBuses {
    async fn connect<F, Fut>(connect: F) -> Result<Self>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<Arc<dyn StreamBus>>>,
    {
        Ok(Self {
            producer: connect().await?,
            consumer: connect().await?,
            dashboard: connect().await?,
        })
    }
}

fn consumer(cfg: &PipelineConfig, bus: Arc<dyn StreamBus>) -> Result<Consumer> {
    let client = HttpTrustClient::new(cfg.api_base(), 30)?;
    Ok(Consumer::new(cfg.clone(), bus, Arc::new(client)))
}

async fn serve_dashboard(cfg: &PipelineConfig, bus: Arc<dyn StreamBus>) -> Result<()> {
    let dash = Dashboard::new();
    dash.spawn_listener(bus, cfg.results_stream.clone());
    let app = dash.router().merge(Metrics::init().router());

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.dashboard_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "dashboard listening");
    axum::serve(listener, app).await.context("dashboard server")
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    trust_verify::init_logging("info");

    let cli = Cli::parse();
    let cfg = PipelineConfig::from_env();

    match cli.command {
        Command::Collect => {
            let (path, n) = collector(&cfg)?.run_once().await?;
            tracing::info!(path = %path.display(), count = n, "collection finished");
        }
        Command::Produce => {
            let bus = bus(&cfg).await?;
            let n = producer::run_once(&cfg, bus.as_ref()).await?;
            tracing::info!(count = n, "articles produced");
        }
        Command::Consume => {
            let bus = bus(&cfg).await?;
            consumer(&cfg, bus)?.run().await;
        }
        Command::Dashboard => {
            let bus = bus(&cfg).await?;
            serve_dashboard(&cfg, bus).await?;
        }
        Command::Schedule => {
            let bus = bus(&cfg).await?;
            let sched = scheduler::SchedulerCfg::from_pipeline(&cfg);
            let handles = scheduler::spawn(sched, Arc::new(collector(&cfg)?), cfg.clone(), bus);
            tracing::info!(
                collector_every_min = cfg.collector_interval_minutes,
                producer_every_min = cfg.producer_interval_minutes,
                "scheduler started"
            );
            tokio::signal::ctrl_c().await?;
            handles.abort();
        }
        Command::Check => {
            let report = deploy_check::run(&cfg).await;
            if !report.passed() {
                anyhow::bail!("deployment check failed");
            }
            tracing::info!("all checks passed");
        }
        Command::All => {
            let buses = AllBuses::connect(|| bus(&cfg)).await?;
            let sched = scheduler::SchedulerCfg::from_pipeline(&cfg);
            let handles =
                scheduler::spawn(sched, Arc::new(collector(&cfg)?), cfg.clone(), buses.producer);
            let consumer = consumer(&cfg, buses.consumer)?;
            let consume_task = tokio::spawn(async move { consumer.run().await });

            tokio::select! {
                res = serve_dashboard(&cfg, buses.dashboard) => res?,
                _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
            }
            handles.abort();
            consume_task.abort();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trust_verify::pipeline::MemoryBus;

    #[tokio::test]
    async fn all_mode_gives_each_blocking_reader_its_own_bus() {
        let opened = AtomicUsize::new(0);
        let buses = AllBuses::connect(|| {
            opened.fetch_add(1, Ordering::SeqCst);
            async { Ok(Arc::new(MemoryBus::new()) as Arc<dyn StreamBus>) }
        })
        .await
        .unwrap();

        assert_eq!(opened.load(Ordering::SeqCst), 3);
        assert!(!Arc::ptr_eq(&buses.consumer, &buses.dashboard));
        assert!(!Arc::ptr_eq(&buses.consumer, &buses.producer));
        assert!(!Arc::ptr_eq(&buses.dashboard, &buses.producer));
    }
}
