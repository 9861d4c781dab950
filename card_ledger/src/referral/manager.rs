//! Referral read side.

use super::models::{ReferralCode, ReferralInfo, ReferredUser};
use crate::{
    config::LedgerConfig,
    errors::{LedgerError, LedgerResult, Resource},
};
use sqlx::{PgPool, Row};
use std::sync::Arc;

/// Referral manager
#[derive(Clone)]
pub struct ReferralManager {
    pool: Arc<PgPool>,
    config: Arc<LedgerConfig>,
}

impl ReferralManager {
    /// Create a new referral manager
    pub fn new(pool: Arc<PgPool>, config: Arc<LedgerConfig>) -> Self {
        Self { pool, config }
    }

    /// Get the referral code owned by a user
    ///
    /// # Errors
    ///
    /// * `LedgerError::NotFound` - User has no referral code
    pub async fn get_code(&self, user_id: i64) -> LedgerResult<ReferralCode> {
        let sql = format!(
            "SELECT {} FROM referral_codes WHERE user_id = $1",
            ReferralCode::COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(LedgerError::NotFound(Resource::ReferralCode(user_id)))?;

        Ok(ReferralCode::from_row(&row)?)
    }

    /// Code statistics, the users it brought in and the configured bonuses
    pub async fn get_referral_info(&self, user_id: i64) -> LedgerResult<ReferralInfo> {
        let code = self.get_code(user_id).await?;

        let rows = sqlx::query(
            "SELECT u.username, r.referrer_bonus, r.created_at
             FROM referrals r
             JOIN users u ON u.id = r.referred_id
             WHERE r.referrer_id = $1
             ORDER BY r.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let referrals = rows
            .iter()
            .map(|row| {
                Ok(ReferredUser {
                    username: row.try_get("username")?,
                    bonus: row.try_get("referrer_bonus")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(ReferralInfo {
            code: code.code,
            uses_count: code.uses_count,
            total_earned: code.total_earned,
            is_active: code.is_active,
            referrals,
            referrer_bonus: self.config.referrer_bonus,
            referred_bonus: self.config.referred_bonus,
        })
    }
}
