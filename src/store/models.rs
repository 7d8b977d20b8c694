use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::Label;
use crate::scoring::{TrustFactors, TrustLevel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub hashed_password: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default = "yes")]
    pub is_active: bool,
    #[serde(default)]
    pub is_admin: bool,
}

fn yes() -> bool {
    true
}

/// `User` without the password hash; what the API returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_admin: bool,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            email: u.email.clone(),
            username: u.username.clone(),
            full_name: u.full_name.clone(),
            created_at: u.created_at,
            last_login: u.last_login,
            is_active: u.is_active,
            is_admin: u.is_admin,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub hashed_password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Url,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: String,
    pub user_id: String,
    pub content_type: ContentType,
    pub content: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub prediction: Label,
    pub confidence: f64,
    pub trust_score: i64,
    pub trust_level: TrustLevel,
    pub created_at: DateTime<Utc>,
    pub factors: TrustFactors,
    /// Trust details; URL analyses carry extra source fields.
    pub details: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub content_type: ContentType,
    pub content: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub prediction: Label,
    pub confidence: f64,
    pub trust_score: i64,
    pub trust_level: TrustLevel,
    pub factors: TrustFactors,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub user: PublicUser,
    pub analysis_count: usize,
    pub recent_analyses: Vec<Analysis>,
    pub average_trust_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetToken {
    pub token: String,
    pub user_id: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}
