//! Withdraw request admission rules.

use crate::{
    config::LedgerConfig,
    errors::{LedgerError, LedgerResult},
    money::validate_amount,
    wallet::Wallet,
};
use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;

/// Check a withdraw request against the locked wallet state
///
/// Rules are applied in a fixed order and the first violation is returned:
/// amount shape, configured minimum, available balance, daily cap, open request.
///
/// # Arguments
///
/// * `wallet` - Wallet as read under its row lock
/// * `amount` - Requested amount
/// * `requested_today` - Sum of today's requests that count toward the cap
/// * `has_open_request` - Whether a PENDING/PROCESSING request exists
pub fn check_request(
    config: &LedgerConfig,
    wallet: &Wallet,
    amount: Decimal,
    requested_today: Decimal,
    has_open_request: bool,
) -> LedgerResult<Decimal> {
    let amount = validate_amount(amount)?;

    if amount < config.min_withdraw {
        return Err(LedgerError::BelowMinimum {
            amount,
            minimum: config.min_withdraw,
        });
    }

    if !wallet.can_withdraw(amount) {
        return Err(LedgerError::InsufficientBalance {
            available: wallet.balance,
            required: amount,
        });
    }

    if requested_today + amount > config.max_withdraw_daily {
        let remaining = (config.max_withdraw_daily - requested_today).max(Decimal::ZERO);
        return Err(LedgerError::DailyLimitExceeded { remaining });
    }

    if has_open_request {
        return Err(LedgerError::RequestAlreadyPending);
    }

    Ok(amount)
}

/// Start of the UTC day containing `now`
pub fn utc_day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Hide the middle of a payout key: `abc***xyz`, or `***` for short keys
pub fn mask_payout_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 6 {
        return "***".to_string();
    }

    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{head}***{tail}")
}
