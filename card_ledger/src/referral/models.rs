//! Referral data models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow};

/// Referral code owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralCode {
    pub id: i64,
    pub user_id: i64,
    pub code: String,
    pub uses_count: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_earned: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ReferralCode {
    pub(crate) const COLUMNS: &'static str =
        "id, user_id, code, uses_count, total_earned, is_active, created_at";

    pub(crate) fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            code: row.try_get("code")?,
            uses_count: row.try_get("uses_count")?,
            total_earned: row.try_get("total_earned")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Record of one user registering with another user's code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    pub id: i64,
    pub referrer_id: i64,
    pub referred_id: i64,
    pub code_id: Option<i64>,
    #[serde(with = "rust_decimal::serde::float")]
    pub referrer_bonus: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub referred_bonus: Decimal,
    pub bonus_paid: bool,
    pub created_at: DateTime<Utc>,
}

impl Referral {
    pub(crate) const COLUMNS: &'static str = "id, referrer_id, referred_id, code_id, \
        referrer_bonus, referred_bonus, bonus_paid, created_at";

    pub(crate) fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            referrer_id: row.try_get("referrer_id")?,
            referred_id: row.try_get("referred_id")?,
            code_id: row.try_get("code_id")?,
            referrer_bonus: row.try_get("referrer_bonus")?,
            referred_bonus: row.try_get("referred_bonus")?,
            bonus_paid: row.try_get("bonus_paid")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// A user brought in by a referral code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferredUser {
    pub username: String,
    /// Bonus the referrer earned for this user
    #[serde(with = "rust_decimal::serde::float")]
    pub bonus: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Referral overview for a code owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralInfo {
    pub code: String,
    pub uses_count: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_earned: Decimal,
    pub is_active: bool,
    pub referrals: Vec<ReferredUser>,
    /// Currently configured bonus for the code owner
    #[serde(with = "rust_decimal::serde::float")]
    pub referrer_bonus: Decimal,
    /// Currently configured bonus for the new user
    #[serde(with = "rust_decimal::serde::float")]
    pub referred_bonus: Decimal,
}
