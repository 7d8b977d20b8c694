//! Password hashing, JWT bearer tokens and the request extractors built on them.

use anyhow::{Context, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::store::{Store, User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User email.
    pub sub: String,
    pub exp: i64,
}

pub struct Auth {
    store: Arc<Store>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_ttl: Duration,
    bcrypt_cost: u32,
}

impl Auth {
    pub fn new(store: Arc<Store>, secret: &str, token_ttl_minutes: i64, bcrypt_cost: u32) -> Self {
        Self {
            store,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl: Duration::minutes(token_ttl_minutes.max(1)),
            bcrypt_cost,
        }
    }

    pub fn from_config(cfg: &AppConfig, store: Arc<Store>) -> Self {
        Self::new(store, &cfg.jwt_secret, cfg.token_ttl_minutes, cfg.bcrypt_cost)
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// bcrypt runs on the blocking pool.
    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let pw = password.to_string();
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(pw, cost))
            .await
            .context("hash task panicked")?
            .context("hashing password")
    }

    pub async fn verify_password(&self, password: &str, hashed: &str) -> bool {
        let pw = password.to_string();
        let hashed = hashed.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(pw, &hashed).unwrap_or(false))
            .await
            .unwrap_or(false)
    }

    pub fn issue_token(&self, email: &str) -> Result<String> {
        let claims = Claims {
            sub: email.to_string(),
            exp: (Utc::now() + self.token_ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding).context("signing token")
    }

    pub fn decode_token(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|d| d.claims)
            .ok()
    }

    /// The active user with this email and password; records the login.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.store.user_by_email(email).await? else {
            return Ok(None);
        };
        if !user.is_active || !self.verify_password(password, &user.hashed_password).await {
            return Ok(None);
        }
        self.store.touch_last_login(&user.id).await?;
        Ok(Some(user))
    }

    /// Resolve `Authorization: Bearer <jwt>` to an active user.
    pub async fn user_from_headers(&self, headers: &HeaderMap) -> Option<User> {
        let token = bearer_token(headers)?;
        let claims = self.decode_token(token)?;
        match self.store.user_by_email(&claims.sub).await {
            Ok(Some(u)) if u.is_active => Some(u),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "user lookup failed during auth");
                None
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.trim().split_once(' ')?;
    (scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty()).then(|| token.trim())
}

/// Authenticated caller; 401 otherwise.
pub struct CurrentUser(pub User);

/// Authenticated caller if the request carries a valid token.
pub struct MaybeUser(pub Option<User>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    Arc<Auth>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<Auth>::from_ref(state);
        auth.user_from_headers(&parts.headers)
            .await
            .map(CurrentUser)
            .ok_or_else(ApiError::credentials)
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    Arc<Auth>: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<Auth>::from_ref(state);
        Ok(MaybeUser(auth.user_from_headers(&parts.headers).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewUser;
    use axum::http::HeaderValue;

    fn auth(dir: &std::path::Path) -> Auth {
        Auth::new(Arc::new(Store::new(dir)), "test-secret", 30, 4)
    }

    #[test]
    fn bearer_parsing() {
        let mut h = HeaderMap::new();
        assert_eq!(bearer_token(&h), None);
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&h), Some("abc.def"));
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&h), None);
    }

    #[test]
    fn tokens_round_trip_and_reject_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let a = auth(dir.path());
        let t = a.issue_token("me@x.io").unwrap();
        assert_eq!(a.decode_token(&t).unwrap().sub, "me@x.io");

        let other = Auth::new(Arc::new(Store::new(dir.path())), "other-secret", 30, 4);
        assert!(other.decode_token(&t).is_none());

        let expired = encode(
            &Header::default(),
            &Claims {
                sub: "me@x.io".into(),
                exp: Utc::now().timestamp() - 3600,
            },
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(a.decode_token(&expired).is_none());
    }

    #[tokio::test]
    async fn authenticate_checks_password_and_records_login() {
        let dir = tempfile::tempdir().unwrap();
        let a = auth(dir.path());
        let hashed = a.hash_password("s3cret!").await.unwrap();
        a.store()
            .create_user(NewUser {
                email: "u@x.io".into(),
                username: "u".into(),
                full_name: None,
                hashed_password: hashed,
            })
            .await
            .unwrap();

        assert!(a.authenticate("u@x.io", "wrong").await.unwrap().is_none());
        assert!(a.authenticate("nobody@x.io", "s3cret!").await.unwrap().is_none());
        let u = a.authenticate("u@x.io", "s3cret!").await.unwrap().unwrap();
        let stored = a.store().user_by_id(&u.id).await.unwrap().unwrap();
        assert!(stored.last_login.is_some());
    }
}
