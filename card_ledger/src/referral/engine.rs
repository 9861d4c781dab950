//! Referral code generation and redemption.
//!
//! Both steps run inside the caller's open transaction; registration composes
//! them with wallet creation into a single atomic unit.

use super::models::{Referral, ReferralCode};
use crate::{
    config::LedgerConfig,
    errors::{LedgerError, LedgerResult},
    wallet::{AuditInfo, ledger},
};
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::PgConnection;

/// Characters a referral code is drawn from
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of generated codes
pub const CODE_LENGTH: usize = 8;

/// Collisions tolerated before giving up on a new code
const MAX_CODE_ATTEMPTS: u32 = 5;

/// Draw a random code of [`CODE_LENGTH`] uppercase alphanumerics
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Normalize a user-typed code; blank input means no code
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_uppercase();
    if code.is_empty() { None } else { Some(code) }
}

fn random_code() -> String {
    let mut rng = rand::rng();
    generate_code(&mut rng)
}

/// Create the referral code for a new user, retrying on collision
pub(crate) async fn create_code(conn: &mut PgConnection, user_id: i64) -> LedgerResult<ReferralCode> {
    let sql = format!(
        "INSERT INTO referral_codes (user_id, code) VALUES ($1, $2) \
         ON CONFLICT (code) DO NOTHING \
         RETURNING {}",
        ReferralCode::COLUMNS
    );

    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(random_code())
            .fetch_optional(&mut *conn)
            .await?;

        if let Some(row) = row {
            return Ok(ReferralCode::from_row(&row)?);
        }
        log::debug!("Referral code collision for user {} (attempt {})", user_id, attempt);
    }

    Err(LedgerError::CodeGenerationFailed(MAX_CODE_ATTEMPTS))
}

/// Redeem a referral code on behalf of a newly registered user
///
/// Returns `None` without touching any balance when the code is unknown,
/// inactive, owned by the new user, or the user was already referred.
///
/// # Arguments
///
/// * `code` - Normalized code (see [`normalize_code`])
/// * `referred_id` - The new user
/// * `referred_username` - Shown in the referrer's bonus description
pub(crate) async fn redeem(
    conn: &mut PgConnection,
    config: &LedgerConfig,
    code: &str,
    referred_id: i64,
    referred_username: &str,
    audit: &AuditInfo,
) -> LedgerResult<Option<Referral>> {
    let sql = format!(
        "SELECT {} FROM referral_codes WHERE code = $1 AND is_active FOR UPDATE",
        ReferralCode::COLUMNS
    );
    let Some(row) = sqlx::query(&sql).bind(code).fetch_optional(&mut *conn).await? else {
        log::debug!("Ignoring unknown referral code {}", code);
        return Ok(None);
    };
    let referral_code = ReferralCode::from_row(&row)?;

    if referral_code.user_id == referred_id {
        return Ok(None);
    }

    let sql = format!(
        "INSERT INTO referrals \
             (referrer_id, referred_id, code_id, referrer_bonus, referred_bonus, bonus_paid) \
         VALUES ($1, $2, $3, $4, $5, TRUE) \
         ON CONFLICT (referred_id) DO NOTHING \
         RETURNING {}",
        Referral::COLUMNS
    );
    let Some(row) = sqlx::query(&sql)
        .bind(referral_code.user_id)
        .bind(referred_id)
        .bind(referral_code.id)
        .bind(config.referrer_bonus)
        .bind(config.referred_bonus)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };
    let referral = Referral::from_row(&row)?;

    let wallets =
        ledger::lock_wallets_for_users(&mut *conn, &[referral_code.user_id, referred_id]).await?;

    if config.referrer_bonus > Decimal::ZERO {
        if let Some(wallet) = wallets.get(&referral_code.user_id) {
            ledger::deposit(
                &mut *conn,
                wallet.id,
                config.referrer_bonus,
                format!("Referral bonus: {referred_username}"),
                true,
                &AuditInfo::default(),
            )
            .await?;
        }
    }

    sqlx::query(
        "UPDATE referral_codes
         SET uses_count = uses_count + 1, total_earned = total_earned + $1
         WHERE id = $2",
    )
    .bind(config.referrer_bonus)
    .bind(referral_code.id)
    .execute(&mut *conn)
    .await?;

    if config.referred_bonus > Decimal::ZERO {
        if let Some(wallet) = wallets.get(&referred_id) {
            ledger::deposit(
                &mut *conn,
                wallet.id,
                config.referred_bonus,
                "Referral code bonus".to_string(),
                true,
                audit,
            )
            .await?;
        }
    }

    log::info!(
        "User {} redeemed referral code of user {}",
        referred_id,
        referral_code.user_id
    );

    Ok(Some(referral))
}
