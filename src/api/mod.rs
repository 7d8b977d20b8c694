//! HTTP surface. `router` wires every route onto one `AppState`.

mod account;
mod analysis;
mod info;
mod mlops;

use anyhow::Result;
use axum::{
    extract::{FromRef, FromRequest},
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;

use crate::auth::Auth;
use crate::classifier::ModelHandle;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::metrics::Metrics;
use crate::mlops::Mlops;
use crate::notify::ResetMailer;
use crate::scoring::HotReloadWeights;
use crate::scraper::Scraper;
use crate::store::Store;

pub const API_TITLE: &str = "Trust Verify API";
pub const API_DESCRIPTION: &str = "API for fake news detection and trust scoring";
pub const API_VERSION: &str = "1.0.0";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub model: ModelHandle,
    pub weights: Arc<HotReloadWeights>,
    pub scraper: Arc<Scraper>,
    pub store: Arc<Store>,
    pub auth: Arc<Auth>,
    pub mailer: Option<Arc<ResetMailer>>,
    pub mlops: Arc<Mlops>,
    pub metrics: Metrics,
}

impl FromRef<AppState> for Arc<Auth> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AppState {
    /// Assemble state from parts; tests pass their own scraper and model.
    pub fn new(
        config: AppConfig,
        model: ModelHandle,
        scraper: Scraper,
        mlops: Mlops,
        mailer: Option<ResetMailer>,
    ) -> Self {
        let store = Arc::new(Store::new(&config.data_dir));
        let auth = Arc::new(Auth::from_config(&config, store.clone()));
        Self {
            weights: Arc::new(HotReloadWeights::new(Some(config.trust_weights_path.as_path()))),
            scraper: Arc::new(scraper),
            store,
            auth,
            mailer: mailer.map(Arc::new),
            mlops: Arc::new(mlops),
            metrics: Metrics::init(),
            model,
            config: Arc::new(config),
        }
    }

    /// Production wiring: HTTP scraper, SMTP mailer if configured, and the
    /// registry (or local) model.
    pub fn from_config(config: AppConfig, mlops: Mlops) -> Result<Self> {
        let model = ModelHandle::new();
        match mlops.load_initial_model(&config.model_path) {
            Some((m, origin)) => model.swap(m, origin),
            None => metrics::gauge!("model_loaded").set(0.0),
        }
        let scraper = Scraper::from_config(&config)?;
        let mailer = ResetMailer::from_env();
        if mailer.is_none() {
            tracing::info!("SMTP not configured; reset links are returned in responses");
        }
        Ok(Self::new(config, model, scraper, mlops, mailer))
    }
}

/// JSON body whose rejections use the `{"detail": ..}` error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

fn cors(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::very_permissive();
    }
    let list: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(list))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

pub fn router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();
    let cors = cors(&state.config.cors_origins);
    let metrics = state.metrics.router();

    Router::new()
        .route("/", get(info::index))
        .route("/health", get(info::health))
        .route("/api-info", get(info::api_info))
        .route("/predict", post(analysis::predict))
        .route("/trust-score", post(analysis::trust_score))
        .route("/extract-url", post(analysis::extract_url))
        .route("/analyze-url", post(analysis::analyze_url))
        .route("/register", post(account::register))
        .route("/token", post(account::token))
        .route("/login", post(account::login))
        .route("/users/me", get(account::me))
        .route("/users/me/profile", get(account::profile))
        .route("/users/me/analyses", get(account::my_analyses))
        .route("/analyses/{id}", get(account::analysis_by_id))
        .route("/forgot-password", post(account::forgot_password))
        .route("/reset-password", post(account::reset_password))
        .route("/feedback", post(mlops::submit_feedback))
        .route("/feedback/stats", get(mlops::feedback_stats))
        .route("/check-drift", post(mlops::check_drift))
        .route("/model-info", get(mlops::model_info))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .merge(metrics)
        .layer(cors)
}
