use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiJson, AppState};
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::mlops::{drift, FeedbackStats};

#[derive(Deserialize)]
pub struct FeedbackInput {
    text: String,
    predicted_label: i64,
    corrected_label: i64,
    #[serde(default)]
    source: Option<String>,
}

fn label(v: i64, field: &str) -> ApiResult<u8> {
    match v {
        0 | 1 => Ok(v as u8),
        _ => Err(ApiError::Unprocessable(format!(
            "{field} must be 0 (fake) or 1 (real)"
        ))),
    }
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<FeedbackInput>,
) -> ApiResult<Json<Value>> {
    let predicted = label(body.predicted_label, "predicted_label")?;
    let corrected = label(body.corrected_label, "corrected_label")?;
    let source = match body.source.as_deref().map(str::trim) {
        Some("user") => Some(format!("user_{}", user.username)),
        other => other.map(str::to_string),
    };

    let mlops = state.mlops.clone();
    let text = body.text;
    let outcome = tokio::task::spawn_blocking(move || {
        mlops
            .feedback
            .submit(&text, predicted, corrected, source.as_deref())
    })
    .await;

    let success = match outcome {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "feedback not saved");
            false
        }
        Err(e) => {
            tracing::error!(error = %e, "feedback task panicked");
            false
        }
    };
    let message = if success {
        "Feedback submitted successfully"
    } else {
        "Failed to submit feedback"
    };
    Ok(Json(json!({ "success": success, "message": message })))
}

pub async fn feedback_stats(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> ApiResult<Json<FeedbackStats>> {
    Ok(Json(state.mlops.feedback.stats()?))
}

/// Admin only. Returns at once; the report lands in the drift dir.
pub async fn check_drift(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<(StatusCode, Json<Value>)> {
    if !user.is_admin {
        return Err(ApiError::Forbidden("Admin privileges required".into()));
    }
    if !state.mlops.enabled() {
        return Err(ApiError::ServiceUnavailable(
            "MLOps integration not available".into(),
        ));
    }

    let mlops = state.mlops.clone();
    let model = state.model.current();
    tracing::info!(user_id = %user.id, "drift check triggered");
    tokio::spawn(async move {
        let run = tokio::task::spawn_blocking(move || {
            drift::detect(&mlops.config, None, None, model.as_deref())
        })
        .await;
        match run {
            Ok(Ok(Some(r))) => tracing::info!(drift_detected = r.drift_detected, "drift check finished"),
            Ok(Ok(None)) => tracing::warn!("drift check found no data to compare"),
            Ok(Err(e)) => tracing::error!(error = %e, "drift check failed"),
            Err(e) => tracing::error!(error = %e, "drift task panicked"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Drift check triggered. Results will be saved to the drift directory."
        })),
    ))
}

pub async fn model_info(State(state): State<AppState>) -> Json<Value> {
    let info = state.mlops.model_info(&state.model);
    let mut v = serde_json::to_value(info).unwrap_or_else(|_| json!({}));
    if let Some(obj) = v.as_object_mut() {
        obj.insert("models_loaded".into(), json!(state.model.is_loaded()));
    }
    Json(v)
}
