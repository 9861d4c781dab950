//! Account data models.

use crate::auth::{Role, UserId};
use crate::errors::decode_enum;
use crate::wallet::AuditInfo;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow};

/// User model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub(crate) const COLUMNS: &'static str = "id, username, email, role, created_at";

    pub(crate) fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            role: decode_enum(row.try_get("role")?)?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Someone else's referral code, as typed
    #[serde(default)]
    pub referral_code: Option<String>,
    #[serde(default)]
    pub audit: AuditInfo,
}

/// Outcome of a registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub user: User,
    /// Wallet balance after welcome and referral bonuses
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    /// The new user's own referral code
    pub referral_code: String,
    /// Whether a referral code was redeemed
    pub referral_applied: bool,
}
