//! Wallet manager implementation.

use super::{
    ledger,
    models::{AuditInfo, Transaction, Wallet, WalletSummary},
};
use crate::{
    auth::{Actor, Capability},
    config::LedgerConfig,
    db::{begin_atomic, timeouts::bounded},
    errors::{LedgerError, LedgerResult, Resource},
    money::validate_amount,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use std::sync::Arc;

/// Default page size for transaction history
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Transactions embedded in a wallet summary
const SUMMARY_RECENT_TRANSACTIONS: i64 = 10;

/// Wallet manager
#[derive(Clone)]
pub struct WalletManager {
    pool: Arc<PgPool>,
    config: Arc<LedgerConfig>,
}

impl WalletManager {
    /// Create a new wallet manager
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `config` - Ledger configuration
    pub fn new(pool: Arc<PgPool>, config: Arc<LedgerConfig>) -> Self {
        Self { pool, config }
    }

    /// Get the wallet owned by a user
    ///
    /// # Errors
    ///
    /// * `LedgerError::NotFound` - User has no wallet
    pub async fn get_wallet(&self, user_id: i64) -> LedgerResult<Wallet> {
        let sql = format!("SELECT {} FROM wallets WHERE user_id = $1", Wallet::COLUMNS);
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(LedgerError::NotFound(Resource::Wallet(user_id)))?;

        Ok(Wallet::from_row(&row)?)
    }

    /// Get wallet, recent transactions and the amount held by open withdraw requests
    pub async fn get_wallet_summary(&self, user_id: i64) -> LedgerResult<WalletSummary> {
        let wallet = self.get_wallet(user_id).await?;
        let recent_transactions = self
            .get_transactions(user_id, SUMMARY_RECENT_TRANSACTIONS)
            .await?;

        let pending_withdraws: Decimal = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0) AS total
             FROM withdraw_requests
             WHERE wallet_id = $1 AND status IN ('PENDING', 'PROCESSING')",
        )
        .bind(wallet.id)
        .fetch_one(self.pool.as_ref())
        .await?
        .try_get("total")?;

        Ok(WalletSummary {
            wallet,
            recent_transactions,
            pending_withdraws,
        })
    }

    /// Get a user's transactions, most recent first
    ///
    /// # Arguments
    ///
    /// * `user_id` - Wallet owner
    /// * `limit` - Maximum number of entries (see [`DEFAULT_HISTORY_LIMIT`])
    pub async fn get_transactions(&self, user_id: i64, limit: i64) -> LedgerResult<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions
             WHERE wallet_id = (SELECT id FROM wallets WHERE user_id = $1)
             ORDER BY created_at DESC, id DESC
             LIMIT $2",
            Transaction::COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(limit.max(0))
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.iter()
            .map(|row| Transaction::from_row(row).map_err(LedgerError::from))
            .collect()
    }

    /// Credit a wallet
    ///
    /// # Arguments
    ///
    /// * `user_id` - Wallet owner
    /// * `amount` - Positive amount with at most two decimal places
    /// * `description` - Audit description
    /// * `bonus` - Bonus credits are logged as BONUS and not counted in `total_deposited`
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Amount not positive
    /// * `LedgerError::NotFound` - User has no wallet
    pub async fn deposit(
        &self,
        user_id: i64,
        amount: Decimal,
        description: &str,
        bonus: bool,
    ) -> LedgerResult<Transaction> {
        self.deposit_with_audit(user_id, amount, description, bonus, &AuditInfo::default())
            .await
    }

    /// Simulated user deposit
    ///
    /// Deposits are credited directly; there is no payment gateway behind them.
    ///
    /// # Errors
    ///
    /// * `LedgerError::BelowMinimum` - Amount under the configured minimum deposit
    pub async fn deposit_funds(
        &self,
        user_id: i64,
        amount: Decimal,
        audit: &AuditInfo,
    ) -> LedgerResult<Transaction> {
        let amount = validate_amount(amount)?;
        if amount < self.config.min_deposit {
            return Err(LedgerError::BelowMinimum {
                amount,
                minimum: self.config.min_deposit,
            });
        }

        self.deposit_with_audit(user_id, amount, "Token deposit", false, audit)
            .await
    }

    /// Remove tokens from a wallet directly
    ///
    /// This is the administrative debit path. It does not go through the
    /// withdraw request workflow and so ignores its daily limit and pending
    /// request checks.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Amount not positive
    /// * `LedgerError::InsufficientBalance` - Balance below amount
    pub async fn withdraw(
        &self,
        user_id: i64,
        amount: Decimal,
        description: &str,
    ) -> LedgerResult<Transaction> {
        let amount = validate_amount(amount)?;
        let description = description.to_string();

        bounded(self.config.transaction_timeout, async {
            let mut tx = begin_atomic(&self.pool, self.config.lock_timeout).await?;

            let wallet = ledger::lock_wallet_for_user(&mut tx, user_id).await?;
            if !wallet.can_withdraw(amount) {
                return Err(LedgerError::InsufficientBalance {
                    available: wallet.balance,
                    required: amount,
                });
            }

            let entry =
                ledger::withdraw(&mut tx, wallet.id, amount, description, &AuditInfo::default())
                    .await?;

            tx.commit().await?;
            Ok(entry)
        })
        .await
    }

    /// Administrative balance adjustment
    ///
    /// Positive amounts are credited as a bonus, negative amounts are removed
    /// with [`WalletManager::withdraw`].
    ///
    /// # Errors
    ///
    /// * `LedgerError::PermissionDenied` - Actor may not adjust balances
    /// * `LedgerError::InvalidAmount` - Zero amount
    pub async fn adjust_balance(
        &self,
        actor: &Actor,
        user_id: i64,
        amount: Decimal,
        reason: &str,
    ) -> LedgerResult<Transaction> {
        actor.require(Capability::AdjustBalances)?;

        let description = format!("[ADMIN] {reason}");
        let entry = if amount > Decimal::ZERO {
            self.deposit(user_id, amount, &description, true).await?
        } else if amount < Decimal::ZERO {
            self.withdraw(user_id, amount.abs(), &description).await?
        } else {
            return Err(LedgerError::InvalidAmount(amount));
        };

        log::info!(
            "Admin {} adjusted wallet of user {} by {}: {}",
            actor.user_id,
            user_id,
            amount,
            reason
        );

        Ok(entry)
    }

    async fn deposit_with_audit(
        &self,
        user_id: i64,
        amount: Decimal,
        description: &str,
        bonus: bool,
        audit: &AuditInfo,
    ) -> LedgerResult<Transaction> {
        let amount = validate_amount(amount)?;
        let description = description.to_string();

        bounded(self.config.transaction_timeout, async {
            let mut tx = begin_atomic(&self.pool, self.config.lock_timeout).await?;

            let wallet = ledger::lock_wallet_for_user(&mut tx, user_id).await?;
            let entry =
                ledger::deposit(&mut tx, wallet.id, amount, description, bonus, audit).await?;

            tx.commit().await?;
            Ok(entry)
        })
        .await
    }
}
