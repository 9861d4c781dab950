//! Wallet data models.

use crate::errors::{UnknownVariant, decode_enum};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow};
use uuid::Uuid;

/// Wallet model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub user_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub pending_balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_deposited: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_withdrawn: Decimal,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub(crate) const COLUMNS: &'static str = "id, user_id, balance, pending_balance, \
        total_deposited, total_withdrawn, is_verified, created_at, updated_at";

    /// Whether `amount` can leave the available balance
    pub fn can_withdraw(&self, amount: Decimal) -> bool {
        amount > Decimal::ZERO && self.balance >= amount
    }

    pub(crate) fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            balance: row.try_get("balance")?,
            pending_balance: row.try_get("pending_balance")?,
            total_deposited: row.try_get("total_deposited")?,
            total_withdrawn: row.try_get("total_withdrawn")?,
            is_verified: row.try_get("is_verified")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    Purchase,
    Sale,
    Bonus,
    Referral,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdraw => "WITHDRAW",
            TransactionType::Purchase => "PURCHASE",
            TransactionType::Sale => "SALE",
            TransactionType::Bonus => "BONUS",
            TransactionType::Referral => "REFERRAL",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAW" => Ok(TransactionType::Withdraw),
            "PURCHASE" => Ok(TransactionType::Purchase),
            "SALE" => Ok(TransactionType::Sale),
            "BONUS" => Ok(TransactionType::Bonus),
            "REFERRAL" => Ok(TransactionType::Referral),
            other => Err(UnknownVariant::new("transaction type", other)),
        }
    }
}

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Processing => "PROCESSING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "PROCESSING" => Ok(TransactionStatus::Processing),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            "CANCELLED" => Ok(TransactionStatus::Cancelled),
            other => Err(UnknownVariant::new("transaction status", other)),
        }
    }
}

/// Audit log entry, one per balance-affecting event
///
/// Only `status` changes after insert; the store rejects updates to wallet,
/// type or amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub wallet_id: i64,
    pub transaction_type: TransactionType,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub description: String,
    pub status: TransactionStatus,
    pub external_id: Option<String>,
    pub related_listing_id: Option<i64>,
    pub withdraw_request_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub(crate) const COLUMNS: &'static str = "id, wallet_id, transaction_type, amount, \
        description, status, external_id, related_listing_id, withdraw_request_id, \
        ip_address, user_agent, created_at, updated_at";

    pub(crate) fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            wallet_id: row.try_get("wallet_id")?,
            transaction_type: decode_enum(row.try_get("transaction_type")?)?,
            amount: row.try_get("amount")?,
            description: row.try_get("description")?,
            status: decode_enum(row.try_get("status")?)?,
            external_id: row.try_get("external_id")?,
            related_listing_id: row.try_get("related_listing_id")?,
            withdraw_request_id: row.try_get("withdraw_request_id")?,
            ip_address: row.try_get("ip_address")?,
            user_agent: row.try_get("user_agent")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Request metadata recorded on audit rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    pub ip_address: Option<String>,
    pub user_agent: String,
}

impl AuditInfo {
    pub fn new(ip_address: Option<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address,
            user_agent: user_agent.into(),
        }
    }
}

/// Wallet view returned to the wallet owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSummary {
    pub wallet: Wallet,
    pub recent_transactions: Vec<Transaction>,
    /// Sum of PENDING/PROCESSING withdraw requests
    #[serde(with = "rust_decimal::serde::float")]
    pub pending_withdraws: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn wallet_with_balance(balance: Decimal) -> Wallet {
        Wallet {
            id: 1,
            user_id: 1,
            balance,
            pending_balance: Decimal::ZERO,
            total_deposited: Decimal::ZERO,
            total_withdrawn: Decimal::ZERO,
            is_verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_can_withdraw() {
        let wallet = wallet_with_balance(dec!(100.00));
        assert!(wallet.can_withdraw(dec!(100.00)));
        assert!(wallet.can_withdraw(dec!(0.01)));
        assert!(!wallet.can_withdraw(dec!(100.01)));
        assert!(!wallet.can_withdraw(Decimal::ZERO));
        assert!(!wallet.can_withdraw(dec!(-1)));
    }

    #[test]
    fn test_enum_storage_text() {
        assert_eq!(TransactionType::Bonus.to_string(), "BONUS");
        assert_eq!(
            "PURCHASE".parse::<TransactionType>().unwrap(),
            TransactionType::Purchase
        );
        assert_eq!(
            "CANCELLED".parse::<TransactionStatus>().unwrap(),
            TransactionStatus::Cancelled
        );
        assert!("REFUND".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_wallet_serializes_amounts_as_floats() {
        let wallet = wallet_with_balance(dec!(12.50));
        let json = serde_json::to_value(&wallet).unwrap();
        assert_eq!(json["balance"], serde_json::json!(12.5));
        assert_eq!(json["pending_balance"], serde_json::json!(0.0));
    }
}
