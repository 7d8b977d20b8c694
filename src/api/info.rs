use axum::{extract::State, response::Html, Json};
use chrono::Utc;
use serde_json::{json, Value};

use super::{AppState, API_DESCRIPTION, API_TITLE, API_VERSION};

const FALLBACK_INDEX: &str = "<!doctype html><html><head><title>Trust Verify API</title></head>\
<body><h1>Trust Verify API</h1><p>See <a href=\"/api-info\">/api-info</a> for endpoints.</p></body></html>";

/// `index.html` from the static dir when present.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let path = state.config.static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Html(page),
        Err(_) => Html(FALLBACK_INDEX.to_string()),
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": API_VERSION,
        "api_info": {
            "title": API_TITLE,
            "description": API_DESCRIPTION,
        }
    }))
}

pub async fn api_info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": "Fake News Detector API",
        "version": API_VERSION,
        "description": "API for detecting fake news and calculating trust scores",
        "endpoints": [
            { "path": "/predict", "method": "POST", "description": "Predict if a news article is fake or real" },
            { "path": "/trust-score", "method": "POST", "description": "Calculate trust score for a news article" },
            { "path": "/extract-url", "method": "POST", "description": "Extract content from a URL" },
            { "path": "/analyze-url", "method": "POST", "description": "Extract and analyze content from a URL" },
            { "path": "/register", "method": "POST", "description": "Register a new user" },
            { "path": "/token", "method": "POST", "description": "Get an access token (form login)" },
            { "path": "/login", "method": "POST", "description": "Get an access token (JSON login)" },
            { "path": "/users/me", "method": "GET", "description": "Current user" },
            { "path": "/users/me/profile", "method": "GET", "description": "Current user with analysis statistics" },
            { "path": "/users/me/analyses", "method": "GET", "description": "Analyses saved by the current user" },
            { "path": "/analyses/{id}", "method": "GET", "description": "A single saved analysis" },
            { "path": "/forgot-password", "method": "POST", "description": "Request a password reset link" },
            { "path": "/reset-password", "method": "POST", "description": "Reset a password with a token" },
            { "path": "/feedback", "method": "POST", "description": "Submit a label correction" },
            { "path": "/feedback/stats", "method": "GET", "description": "Feedback statistics" },
            { "path": "/check-drift", "method": "POST", "description": "Trigger a drift check (admin)" },
            { "path": "/model-info", "method": "GET", "description": "Serving model information" },
            { "path": "/health", "method": "GET", "description": "Health check" },
            { "path": "/metrics", "method": "GET", "description": "Prometheus metrics" }
        ],
        "models_loaded": state.model.is_loaded(),
        "mlops_available": state.mlops.enabled(),
    }))
}
