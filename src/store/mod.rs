//! JSON-file persistence for users, analyses and password-reset tokens.
//!
//! Each collection is one JSON object keyed by id under the data dir. Every
//! operation holds the store lock for its whole read-modify-write, and writes
//! land in a temp file that is renamed over the original.

pub mod models;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::{distr::Alphanumeric, Rng};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

pub use models::{
    Analysis, ContentType, NewAnalysis, NewUser, PublicUser, ResetToken, User, UserProfile,
};

const USERS: &str = "users.json";
const ANALYSES: &str = "analyses.json";
const RESET_TOKENS: &str = "reset_tokens.json";

const RESET_TOKEN_LEN: usize = 43;
const RESET_TOKEN_TTL_HOURS: i64 = 24;
const RECENT_ANALYSES: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug)]
pub struct Store {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_map<T: DeserializeOwned>(&self, name: &str) -> Result<BTreeMap<String, T>> {
        let path = self.dir.join(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    async fn write_map<T: Serialize>(&self, name: &str, map: &BTreeMap<String, T>) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));
        let bytes = serde_json::to_vec_pretty(map)?;
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("replacing {}", path.display()))
    }

    // ---- users ----

    pub async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let _g = self.lock.lock().await;
        let mut users: BTreeMap<String, User> = self.read_map(USERS).await?;
        let email = new.email.trim().to_string();
        if users.values().any(|u| u.email.eq_ignore_ascii_case(&email)) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4().to_string(),
            email,
            username: new.username,
            full_name: new.full_name,
            hashed_password: new.hashed_password,
            created_at: Utc::now(),
            last_login: None,
            is_active: true,
            is_admin: false,
        };
        users.insert(user.id.clone(), user.clone());
        self.write_map(USERS, &users).await?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let _g = self.lock.lock().await;
        let users: BTreeMap<String, User> = self.read_map(USERS).await?;
        let email = email.trim();
        Ok(users
            .into_values()
            .find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    pub async fn user_by_id(&self, id: &str) -> Result<Option<User>> {
        let _g = self.lock.lock().await;
        let mut users: BTreeMap<String, User> = self.read_map(USERS).await?;
        Ok(users.remove(id))
    }

    pub async fn touch_last_login(&self, id: &str) -> Result<()> {
        let _g = self.lock.lock().await;
        let mut users: BTreeMap<String, User> = self.read_map(USERS).await?;
        if let Some(u) = users.get_mut(id) {
            u.last_login = Some(Utc::now());
            self.write_map(USERS, &users).await?;
        }
        Ok(())
    }

    /// Grant or revoke admin rights. Returns false for an unknown email.
    pub async fn set_admin(&self, email: &str, admin: bool) -> Result<bool> {
        let _g = self.lock.lock().await;
        let mut users: BTreeMap<String, User> = self.read_map(USERS).await?;
        let Some(u) = users
            .values_mut()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
        else {
            return Ok(false);
        };
        u.is_admin = admin;
        self.write_map(USERS, &users).await?;
        Ok(true)
    }

    // ---- analyses ----

    pub async fn create_analysis(&self, user_id: &str, new: NewAnalysis) -> Result<Analysis> {
        let _g = self.lock.lock().await;
        let mut analyses: BTreeMap<String, Analysis> = self.read_map(ANALYSES).await?;
        let a = Analysis {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            content_type: new.content_type,
            content: new.content,
            title: new.title,
            url: new.url,
            prediction: new.prediction,
            confidence: new.confidence,
            trust_score: new.trust_score,
            trust_level: new.trust_level,
            created_at: Utc::now(),
            factors: new.factors,
            details: new.details,
        };
        analyses.insert(a.id.clone(), a.clone());
        self.write_map(ANALYSES, &analyses).await?;
        Ok(a)
    }

    /// Newest first.
    pub async fn analyses_by_user(&self, user_id: &str) -> Result<Vec<Analysis>> {
        let _g = self.lock.lock().await;
        let analyses: BTreeMap<String, Analysis> = self.read_map(ANALYSES).await?;
        let mut out: Vec<Analysis> = analyses
            .into_values()
            .filter(|a| a.user_id == user_id)
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    pub async fn analysis_by_id(&self, id: &str) -> Result<Option<Analysis>> {
        let _g = self.lock.lock().await;
        let mut analyses: BTreeMap<String, Analysis> = self.read_map(ANALYSES).await?;
        Ok(analyses.remove(id))
    }

    pub async fn profile(&self, user: &User) -> Result<UserProfile> {
        let analyses = self.analyses_by_user(&user.id).await?;
        let average_trust_score = if analyses.is_empty() {
            0.0
        } else {
            analyses.iter().map(|a| a.trust_score as f64).sum::<f64>() / analyses.len() as f64
        };
        Ok(UserProfile {
            user: PublicUser::from(user),
            analysis_count: analyses.len(),
            recent_analyses: analyses.into_iter().take(RECENT_ANALYSES).collect(),
            average_trust_score,
        })
    }

    // ---- password reset ----

    /// None when no account has this email.
    pub async fn create_reset_token(&self, email: &str) -> Result<Option<ResetToken>> {
        self.create_reset_token_at(email, Utc::now()).await
    }

    pub async fn create_reset_token_at(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetToken>> {
        let Some(user) = self.user_by_email(email).await? else {
            return Ok(None);
        };
        let _g = self.lock.lock().await;
        let mut tokens: BTreeMap<String, ResetToken> = self.read_map(RESET_TOKENS).await?;
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(RESET_TOKEN_LEN)
            .map(char::from)
            .collect();
        let t = ResetToken {
            token: token.clone(),
            user_id: user.id,
            email: user.email,
            expires_at: now + Duration::hours(RESET_TOKEN_TTL_HOURS),
        };
        tokens.insert(token, t.clone());
        self.write_map(RESET_TOKENS, &tokens).await?;
        Ok(Some(t))
    }

    /// User id for a live token. Expired tokens are removed.
    pub async fn verify_reset_token(&self, token: &str) -> Result<Option<String>> {
        self.verify_reset_token_at(token, Utc::now()).await
    }

    pub async fn verify_reset_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        let _g = self.lock.lock().await;
        let mut tokens: BTreeMap<String, ResetToken> = self.read_map(RESET_TOKENS).await?;
        self.live_token(&mut tokens, token, now).await
    }

    /// Caller holds the lock. Drops the token and returns None if expired.
    async fn live_token(
        &self,
        tokens: &mut BTreeMap<String, ResetToken>,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        let Some(t) = tokens.get(token) else {
            return Ok(None);
        };
        if now > t.expires_at {
            tokens.remove(token);
            self.write_map(RESET_TOKENS, tokens).await?;
            return Ok(None);
        }
        Ok(Some(t.user_id.clone()))
    }

    /// Replace the password hash and burn the token. False if the token is
    /// unknown or expired.
    pub async fn reset_password(&self, token: &str, hashed_password: String) -> Result<bool> {
        self.reset_password_at(token, hashed_password, Utc::now()).await
    }

    /// Check, update and burn under one lock hold, so a token resets once.
    pub async fn reset_password_at(
        &self,
        token: &str,
        hashed_password: String,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let _g = self.lock.lock().await;
        let mut tokens: BTreeMap<String, ResetToken> = self.read_map(RESET_TOKENS).await?;
        let Some(user_id) = self.live_token(&mut tokens, token, now).await? else {
            return Ok(false);
        };
        let mut users: BTreeMap<String, User> = self.read_map(USERS).await?;
        let Some(u) = users.get_mut(&user_id) else {
            return Ok(false);
        };
        u.hashed_password = hashed_password;
        self.write_map(USERS, &users).await?;

        tokens.remove(token);
        self.write_map(RESET_TOKENS, &tokens).await?;
        tracing::info!(user_id = %user_id, "password reset");
        Ok(true)
    }
}
