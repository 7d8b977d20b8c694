//! Classification and scoring endpoints.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{ApiJson, AppState};
use crate::auth::MaybeUser;
use crate::classifier::{Label, Prediction};
use crate::error::{ApiError, ApiResult};
use crate::scoring::{adjust_for_source, assess, TrustFactors, TrustLevel, TrustScoreResponse};
use crate::scraper::{is_valid_url, normalize_input_url, ArticleContent};
use crate::store::{ContentType, NewAnalysis, User};

#[derive(Deserialize)]
pub struct NewsInput {
    text: String,
}

#[derive(Deserialize)]
pub struct UrlInput {
    url: String,
}

#[derive(Serialize)]
pub struct PredictionResponse {
    prediction: Label,
    confidence: f64,
    text_length: usize,
}

#[derive(Serialize)]
pub struct UrlAnalysisResponse {
    prediction: Label,
    confidence: f64,
    trust_score: i64,
    original_trust_score: i64,
    trust_level: TrustLevel,
    factors: TrustFactors,
    details: Value,
    article: ArticleContent,
}

fn predict_or_503(state: &AppState, text: &str) -> ApiResult<Prediction> {
    state
        .model
        .predict(text)
        .ok_or_else(ApiError::models_not_loaded)
}

/// Saving is best effort: the caller still gets their score.
async fn save_analysis(state: &AppState, user: &User, new: NewAnalysis) -> Option<String> {
    match state.store.create_analysis(&user.id, new).await {
        Ok(a) => Some(a.id),
        Err(e) => {
            tracing::warn!(user = %user.id, error = %e, "saving analysis failed");
            None
        }
    }
}

pub async fn predict(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewsInput>,
) -> ApiResult<Json<PredictionResponse>> {
    let p = predict_or_503(&state, &body.text)?;
    counter!("predictions_total", "label" => p.label.as_str()).increment(1);
    Ok(Json(PredictionResponse {
        prediction: p.label,
        confidence: p.confidence,
        text_length: body.text.chars().count(),
    }))
}

pub async fn trust_score(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    ApiJson(body): ApiJson<NewsInput>,
) -> ApiResult<Json<TrustScoreResponse>> {
    let p = predict_or_503(&state, &body.text)?;
    let assessment = assess(&body.text, &p, &state.weights.current());
    counter!("trust_scores_total", "kind" => "text").increment(1);
    histogram!("trust_score").record(assessment.score as f64);

    let mut resp = TrustScoreResponse::new(assessment, p.label);
    if let Some(user) = user {
        let new = NewAnalysis {
            content_type: ContentType::Text,
            content: body.text,
            title: None,
            url: None,
            prediction: p.label,
            confidence: p.confidence,
            trust_score: resp.score,
            trust_level: resp.trust_level,
            factors: resp.factors,
            details: serde_json::to_value(&resp.details).unwrap_or(Value::Null),
        };
        resp.analysis_id = save_analysis(&state, &user, new).await;
    }
    Ok(Json(resp))
}

pub async fn extract_url(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UrlInput>,
) -> ApiResult<Json<ArticleContent>> {
    if !is_valid_url(&body.url) {
        return Err(ApiError::Unprocessable("Invalid URL format".into()));
    }
    let article = state.scraper.get_article(body.url.trim()).await.map_err(|e| {
        tracing::warn!(url = %body.url, error = %e, "extraction failed");
        counter!("extract_failures_total").increment(1);
        ApiError::NotFound("Failed to extract content from the URL".into())
    })?;
    Ok(Json(article))
}

/// `url` from a JSON object or an urlencoded form.
fn url_from_body(headers: &HeaderMap, body: &[u8]) -> Option<String> {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
    let from_json = || {
        serde_json::from_slice::<Value>(body)
            .ok()?
            .get("url")?
            .as_str()
            .map(str::to_string)
    };
    let from_form = || {
        url::form_urlencoded::parse(body)
            .find(|(k, _)| k == "url")
            .map(|(_, v)| v.into_owned())
    };
    let url = if is_form {
        from_form()
    } else {
        from_json().or_else(from_form)
    };
    url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())
}

pub async fn analyze_url(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<UrlAnalysisResponse>> {
    let raw = url_from_body(&headers, &body)
        .ok_or_else(|| ApiError::BadRequest("URL is required".into()))?;
    let url = normalize_input_url(&raw);
    let has_host = url::Url::parse(&url)
        .ok()
        .and_then(|u| u.host_str().map(|h| !h.is_empty()))
        .unwrap_or(false);
    if !has_host {
        return Err(ApiError::BadRequest(
            "Invalid URL format. Please include a valid domain.".into(),
        ));
    }
    if !state.model.is_loaded() {
        return Err(ApiError::models_not_loaded());
    }

    let article = state.scraper.get_article(&url).await.map_err(|e| {
        tracing::warn!(url = %url, error = %e, "extraction failed");
        counter!("extract_failures_total").increment(1);
        ApiError::NotFound("Failed to extract content from the URL".into())
    })?;

    let p = predict_or_503(&state, &article.content)?;
    let assessment = assess(&article.content, &p, &state.weights.current());
    let adjusted = adjust_for_source(
        assessment.score,
        article.source_credibility,
        article.is_known_fake_news,
    );
    counter!("trust_scores_total", "kind" => "url").increment(1);
    histogram!("trust_score").record(adjusted as f64);

    let mut details = serde_json::to_value(&assessment.details).unwrap_or_else(|_| json!({}));
    if let Some(obj) = details.as_object_mut() {
        obj.insert("source_credibility".into(), json!(article.source_credibility));
        obj.insert(
            "is_known_fake_news".into(),
            json!(u8::from(article.is_known_fake_news)),
        );
        obj.insert(
            "reading_time_minutes".into(),
            json!(article.reading_time_minutes),
        );
    }
    let trust_level = TrustLevel::from_score(adjusted);

    if let Some(user) = user {
        let new = NewAnalysis {
            content_type: ContentType::Url,
            content: article.content.clone(),
            title: Some(article.title.clone()),
            url: Some(url.clone()),
            prediction: p.label,
            confidence: p.confidence,
            trust_score: adjusted,
            trust_level,
            factors: assessment.factors,
            details: details.clone(),
        };
        save_analysis(&state, &user, new).await;
    }

    tracing::info!(url = %url, score = adjusted, source = %article.source, "url analyzed");
    Ok(Json(UrlAnalysisResponse {
        prediction: p.label,
        confidence: p.confidence,
        trust_score: adjusted,
        original_trust_score: assessment.score,
        trust_level,
        factors: assessment.factors,
        details,
        article,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn url_from_json_or_form() {
        let mut h = HeaderMap::new();
        assert_eq!(
            url_from_body(&h, br#"{"url":" bbc.com/news "}"#).as_deref(),
            Some("bbc.com/news")
        );
        assert_eq!(url_from_body(&h, br#"{"url":""}"#), None);
        assert_eq!(url_from_body(&h, b"{}"), None);

        h.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        assert_eq!(
            url_from_body(&h, b"url=https%3A%2F%2Fa.test%2Fx&y=1").as_deref(),
            Some("https://a.test/x")
        );
    }
}
