//! Registration, login, the caller's own data and password reset.

use axum::{
    extract::{Path, State},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{ApiJson, AppState};
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::notify::reset_link;
use crate::store::{Analysis, NewUser, PublicUser, StoreError, UserProfile};

#[derive(Deserialize)]
pub struct RegisterInput {
    email: String,
    username: String,
    password: String,
    #[serde(default)]
    full_name: Option<String>,
}

/// OAuth2 password form; `username` carries the email.
#[derive(Deserialize)]
pub struct TokenForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct LoginInput {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct ForgotInput {
    email: String,
}

#[derive(Deserialize)]
pub struct ResetInput {
    token: String,
    new_password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    access_token: String,
    token_type: &'static str,
}

/// `local@domain.tld` with no whitespace.
fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !s.chars().any(char::is_whitespace)
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterInput>,
) -> ApiResult<Json<PublicUser>> {
    let email = body.email.trim().to_string();
    if !looks_like_email(&email) {
        return Err(ApiError::BadRequest("Invalid email address".into()));
    }
    let username = body.username.trim().to_string();
    if username.is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Username and password are required".into(),
        ));
    }
    let hashed_password = state.auth.hash_password(&body.password).await?;
    let new = NewUser {
        email,
        username,
        full_name: body.full_name.filter(|n| !n.trim().is_empty()),
        hashed_password,
    };
    match state.store.create_user(new).await {
        Ok(user) => Ok(Json(PublicUser::from(&user))),
        Err(StoreError::DuplicateEmail) => {
            Err(ApiError::BadRequest("Email already registered".into()))
        }
        Err(StoreError::Other(e)) => Err(ApiError::Internal(e)),
    }
}

async fn login_with(state: &AppState, email: &str, password: &str) -> ApiResult<Json<TokenResponse>> {
    let user = state
        .auth
        .authenticate(email.trim(), password)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Incorrect email or password".into()))?;
    let access_token = state.auth.issue_token(&user.email)?;
    tracing::info!(user_id = %user.id, "login");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}

pub async fn token(
    State(state): State<AppState>,
    form: Result<Form<TokenForm>, axum::extract::rejection::FormRejection>,
) -> ApiResult<Json<TokenResponse>> {
    let Form(form) = form?;
    login_with(&state, &form.username, &form.password).await
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginInput>,
) -> ApiResult<Json<TokenResponse>> {
    login_with(&state, &body.email, &body.password).await
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(PublicUser::from(&user))
}

pub async fn profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(state.store.profile(&user).await?))
}

pub async fn my_analyses(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<Analysis>>> {
    Ok(Json(state.store.analyses_by_user(&user.id).await?))
}

pub async fn analysis_by_id(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Analysis>> {
    let analysis = state
        .store
        .analysis_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Analysis not found".into()))?;
    if analysis.user_id != user.id {
        return Err(ApiError::Forbidden(
            "Not authorized to access this analysis".into(),
        ));
    }
    Ok(Json(analysis))
}

/// Reports success for any email. The link is in the body only when no
/// mailer is configured.
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ForgotInput>,
) -> ApiResult<Json<Value>> {
    let Some(t) = state.store.create_reset_token(body.email.trim()).await? else {
        return Ok(Json(json!({
            "success": true,
            "message": "If your email is registered, you will receive a password reset link"
        })));
    };
    let link = reset_link(&state.config.frontend_url, &t.token);

    match &state.mailer {
        Some(mailer) => {
            if let Err(e) = mailer.send_reset(&t.email, &link).await {
                tracing::error!(error = %e, "reset email not sent");
            }
            Ok(Json(json!({
                "success": true,
                "message": "Password reset link sent to your email"
            })))
        }
        None => {
            tracing::info!(user_id = %t.user_id, link = %link, "password reset link issued");
            Ok(Json(json!({
                "success": true,
                "message": "Password reset link sent to your email",
                "reset_link": link,
            })))
        }
    }
}

pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetInput>,
) -> ApiResult<Json<Value>> {
    if body.new_password.is_empty() {
        return Err(ApiError::BadRequest("New password is required".into()));
    }
    let hashed = state.auth.hash_password(&body.new_password).await?;
    if !state.store.reset_password(&body.token, hashed).await? {
        return Err(ApiError::BadRequest("Invalid or expired token".into()));
    }
    Ok(Json(json!({ "success": true, "message": "Password reset successfully" })))
}

#[cfg(test)]
mod tests {
    use super::looks_like_email;

    #[test]
    fn email_shape() {
        assert!(looks_like_email("a@b.co"));
        assert!(looks_like_email("first.last@mail.example.org"));
        assert!(!looks_like_email("nope"));
        assert!(!looks_like_email("@b.co"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("a b@c.de"));
        assert!(!looks_like_email("a@@c.de"));
    }
}
