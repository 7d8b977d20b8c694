//! Trust Verify API server.
//! Boots the Axum HTTP server with the model, stores and background retraining.

use shuttle_axum::ShuttleAxum;
use std::sync::Arc;
use std::time::Duration;

use trust_verify::mlops::{retrain, Mlops};
use trust_verify::{router, AppConfig, AppState};

/// Shuttle installs its own subscriber in deployed environments. Locally,
/// `TRUST_VERIFY_DEV_LOG=1` adds ours.
fn enable_dev_tracing() {
    let dev_flag = std::env::var("TRUST_VERIFY_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if dev_flag && is_dev_env {
        trust_verify::init_logging("trust_verify=info,tower_http=info,warn");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    enable_dev_tracing();

    let config = AppConfig::from_env();
    let mlops = Mlops::from_env();
    let state = AppState::from_config(config, mlops)?;

    if state.mlops.enabled() {
        let every = Duration::from_secs(state.mlops.config.retrain_interval_hours.max(1) * 3600);
        retrain::spawn_scheduler(Arc::clone(&state.mlops), state.model.clone(), every);
    } else {
        tracing::info!("MLOps disabled; scheduled retraining off");
    }

    tracing::info!(
        models_loaded = state.model.is_loaded(),
        "trust verify api ready"
    );
    Ok(router(state).into())
}
