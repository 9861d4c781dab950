//! Withdraw request data models.

use crate::errors::{UnknownVariant, decode_enum};
use crate::wallet::AuditInfo;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow};
use uuid::Uuid;

/// Withdraw request status
///
/// Current logic only moves PENDING to APPROVED or REJECTED. PROCESSING and
/// COMPLETED are reserved for a payout gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WithdrawStatus {
    Pending,
    Approved,
    Processing,
    Completed,
    Rejected,
}

impl WithdrawStatus {
    pub const ALL: [WithdrawStatus; 5] = [
        WithdrawStatus::Pending,
        WithdrawStatus::Approved,
        WithdrawStatus::Processing,
        WithdrawStatus::Completed,
        WithdrawStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WithdrawStatus::Pending => "PENDING",
            WithdrawStatus::Approved => "APPROVED",
            WithdrawStatus::Processing => "PROCESSING",
            WithdrawStatus::Completed => "COMPLETED",
            WithdrawStatus::Rejected => "REJECTED",
        }
    }

    /// PENDING or PROCESSING; a wallet may hold only one such request
    pub fn is_open(self) -> bool {
        matches!(self, WithdrawStatus::Pending | WithdrawStatus::Processing)
    }

    /// Whether the request counts against the daily withdraw cap
    pub fn counts_toward_daily_limit(self) -> bool {
        self != WithdrawStatus::Rejected
    }
}

impl std::fmt::Display for WithdrawStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WithdrawStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(WithdrawStatus::Pending),
            "APPROVED" => Ok(WithdrawStatus::Approved),
            "PROCESSING" => Ok(WithdrawStatus::Processing),
            "COMPLETED" => Ok(WithdrawStatus::Completed),
            "REJECTED" => Ok(WithdrawStatus::Rejected),
            other => Err(UnknownVariant::new("withdraw status", other)),
        }
    }
}

/// Kind of key identifying the payout destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PayoutKeyType {
    Cpf,
    Email,
    Phone,
    Random,
}

impl PayoutKeyType {
    pub fn as_str(self) -> &'static str {
        match self {
            PayoutKeyType::Cpf => "CPF",
            PayoutKeyType::Email => "EMAIL",
            PayoutKeyType::Phone => "PHONE",
            PayoutKeyType::Random => "RANDOM",
        }
    }
}

impl std::fmt::Display for PayoutKeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PayoutKeyType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CPF" => Ok(PayoutKeyType::Cpf),
            "EMAIL" => Ok(PayoutKeyType::Email),
            "PHONE" => Ok(PayoutKeyType::Phone),
            "RANDOM" => Ok(PayoutKeyType::Random),
            _ => Err(UnknownVariant::new("payout key type", s)),
        }
    }
}

/// Withdraw request model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub id: Uuid,
    pub wallet_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: WithdrawStatus,
    pub payout_key_type: PayoutKeyType,
    pub payout_key: String,
    pub ip_address: Option<String>,
    pub rejection_reason: String,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WithdrawRequest {
    pub(crate) const COLUMNS: &'static str = "id, wallet_id, amount, status, payout_key_type, \
        payout_key, ip_address, rejection_reason, processed_at, created_at";

    pub(crate) fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            wallet_id: row.try_get("wallet_id")?,
            amount: row.try_get("amount")?,
            status: decode_enum(row.try_get("status")?)?,
            payout_key_type: decode_enum(row.try_get("payout_key_type")?)?,
            payout_key: row.try_get("payout_key")?,
            ip_address: row.try_get("ip_address")?,
            rejection_reason: row.try_get("rejection_reason")?,
            processed_at: row.try_get("processed_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Input for a new withdraw request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWithdrawRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub payout_key: String,
    pub payout_key_type: PayoutKeyType,
    #[serde(default)]
    pub audit: AuditInfo,
}

/// Withdraw request as shown to its owner, payout key masked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawHistoryEntry {
    pub id: Uuid,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: WithdrawStatus,
    pub payout_key_type: PayoutKeyType,
    pub payout_key: String,
    /// Present only for rejected requests
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Withdraw request as shown to administrators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminWithdrawView {
    pub request: WithdrawRequest,
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

/// One page of the administrative withdraw listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawPage {
    pub withdraws: Vec<AdminWithdrawView>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_statuses() {
        assert!(WithdrawStatus::Pending.is_open());
        assert!(WithdrawStatus::Processing.is_open());
        assert!(!WithdrawStatus::Approved.is_open());
        assert!(!WithdrawStatus::Rejected.is_open());
        assert!(!WithdrawStatus::Completed.is_open());
    }

    #[test]
    fn test_rejected_requests_do_not_count_toward_daily_limit() {
        assert!(!WithdrawStatus::Rejected.counts_toward_daily_limit());
        assert!(WithdrawStatus::Approved.counts_toward_daily_limit());
        assert!(WithdrawStatus::Pending.counts_toward_daily_limit());
    }

    #[test]
    fn test_payout_key_type_parse_is_case_insensitive() {
        assert_eq!("email".parse::<PayoutKeyType>().unwrap(), PayoutKeyType::Email);
        assert_eq!("CPF".parse::<PayoutKeyType>().unwrap(), PayoutKeyType::Cpf);
        assert!("iban".parse::<PayoutKeyType>().is_err());
    }
}
