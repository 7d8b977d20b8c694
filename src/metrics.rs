use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Register help text for every series once per process.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("predictions_total", "Texts classified via /predict.");
        describe_counter!("trust_scores_total", "Trust scores computed (text and URL).");
        describe_counter!(
            "extract_failures_total",
            "URL extractions that produced no usable article."
        );
        describe_counter!(
            "pipeline_messages_total",
            "Stream messages processed by the consumer."
        );
        describe_counter!(
            "pipeline_errors_total",
            "Pipeline failures (collect, produce, consume)."
        );
        describe_counter!("retrain_runs_total", "Model retraining runs started.");
        describe_histogram!("trust_score", "Distribution of returned trust scores.");
        describe_gauge!("model_loaded", "1 when a classifier is serving, else 0.");
        describe_gauge!(
            "pipeline_last_collect_ts",
            "Unix ts of the last successful collector run."
        );
    });
}

impl Metrics {
    /// Install the Prometheus recorder. Later calls reuse the first handle;
    /// if another recorder already owns the process, a detached handle is
    /// returned and renders nothing.
    pub fn init() -> Self {
        let handle = HANDLE
            .get_or_init(|| {
                let builder = PrometheusBuilder::new();
                match builder.install_recorder() {
                    Ok(h) => h,
                    Err(e) => {
                        tracing::warn!(error = %e, "prometheus recorder not installed");
                        PrometheusBuilder::new().build_recorder().handle()
                    }
                }
            })
            .clone();
        ensure_metrics_described();
        Self { handle }
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// `/metrics` in the Prometheus exposition format.
    pub fn router<S: Clone + Send + Sync + 'static>(&self) -> Router<S> {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
