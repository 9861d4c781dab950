//! Withdraw request workflow.

use super::{
    models::{
        AdminWithdrawView, NewWithdrawRequest, WithdrawHistoryEntry, WithdrawPage,
        WithdrawRequest, WithdrawStatus,
    },
    policy,
};
use crate::{
    auth::{Actor, Capability},
    config::LedgerConfig,
    db::{begin_atomic, timeouts::bounded},
    errors::{LedgerError, LedgerResult, Resource},
    wallet::{
        AuditInfo, TransactionStatus, TransactionType,
        ledger::{self, NewTransaction},
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

/// Default number of entries in a user's withdraw history
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;

/// Largest page served by the administrative listing
pub const MAX_PAGE_SIZE: i64 = 100;

/// Reason recorded when an administrator rejects without giving one
pub const DEFAULT_REJECTION_REASON: &str = "Rejected by administrator";

/// Unique index allowing one open request per wallet
const ONE_OPEN_REQUEST_INDEX: &str = "idx_withdraw_requests_one_open";

/// Withdraw request manager
#[derive(Clone)]
pub struct WithdrawManager {
    pool: Arc<PgPool>,
    config: Arc<LedgerConfig>,
}

impl WithdrawManager {
    /// Create a new withdraw manager
    pub fn new(pool: Arc<PgPool>, config: Arc<LedgerConfig>) -> Self {
        Self { pool, config }
    }

    /// Reserve funds for a payout
    ///
    /// Moves `amount` from the available balance to `pending_balance` and
    /// records a PENDING request plus a PENDING WITHDRAW transaction.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Amount not positive
    /// * `LedgerError::BelowMinimum` - Amount under `min_withdraw`
    /// * `LedgerError::InsufficientBalance` - Balance below amount
    /// * `LedgerError::DailyLimitExceeded` - Today's requests would exceed the cap
    /// * `LedgerError::RequestAlreadyPending` - Wallet already has an open request
    pub async fn request_withdraw(
        &self,
        user_id: i64,
        request: NewWithdrawRequest,
    ) -> LedgerResult<WithdrawRequest> {
        bounded(self.config.transaction_timeout, async {
            let mut tx = begin_atomic(&self.pool, self.config.lock_timeout).await?;

            let wallet = ledger::lock_wallet_for_user(&mut tx, user_id).await?;
            let (requested_today, has_open) = withdraw_activity(&mut tx, wallet.id).await?;

            let amount = policy::check_request(
                &self.config,
                &wallet,
                request.amount,
                requested_today,
                has_open,
            )?;

            ledger::debit_balance(&mut tx, wallet.id, amount).await?;
            sqlx::query(
                "UPDATE wallets SET pending_balance = pending_balance + $1, updated_at = NOW()
                 WHERE id = $2",
            )
            .bind(amount)
            .bind(wallet.id)
            .execute(&mut *tx)
            .await?;

            let sql = format!(
                "INSERT INTO withdraw_requests \
                     (id, wallet_id, amount, status, payout_key_type, payout_key, ip_address) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 RETURNING {}",
                WithdrawRequest::COLUMNS
            );
            let row = sqlx::query(&sql)
                .bind(Uuid::new_v4())
                .bind(wallet.id)
                .bind(amount)
                .bind(WithdrawStatus::Pending.as_str())
                .bind(request.payout_key_type.as_str())
                .bind(&request.payout_key)
                .bind(&request.audit.ip_address)
                .fetch_one(&mut *tx)
                .await
                .map_err(open_request_conflict)?;
            let created = WithdrawRequest::from_row(&row)?;

            ledger::insert_transaction(
                &mut tx,
                NewTransaction {
                    wallet_id: wallet.id,
                    transaction_type: TransactionType::Withdraw,
                    amount,
                    description: format!(
                        "Withdraw requested - payout: {}",
                        created.payout_key_type
                    ),
                    status: TransactionStatus::Pending,
                    related_listing_id: None,
                    withdraw_request_id: Some(created.id),
                    audit: &request.audit,
                },
            )
            .await?;

            tx.commit().await?;

            log::info!(
                "Withdraw request {} created for user {}: {}",
                created.id,
                user_id,
                amount
            );

            Ok(created)
        })
        .await
    }

    /// Approve a pending request
    ///
    /// The reserved amount leaves `pending_balance` and is counted in
    /// `total_withdrawn`; the linked transaction becomes COMPLETED.
    ///
    /// # Errors
    ///
    /// * `LedgerError::PermissionDenied` - Actor may not manage withdrawals
    /// * `LedgerError::NotFound` - Unknown request
    /// * `LedgerError::NotPending` - Request already processed
    pub async fn approve(&self, actor: &Actor, request_id: Uuid) -> LedgerResult<WithdrawRequest> {
        actor.require(Capability::ManageWithdrawals)?;

        bounded(self.config.transaction_timeout, async {
            let mut tx = begin_atomic(&self.pool, self.config.lock_timeout).await?;

            let request = lock_pending_request(&mut tx, request_id).await?;
            ledger::lock_wallet(&mut tx, request.wallet_id).await?;

            let sql = format!(
                "UPDATE withdraw_requests SET status = $1, processed_at = NOW() \
                 WHERE id = $2 RETURNING {}",
                WithdrawRequest::COLUMNS
            );
            let row = sqlx::query(&sql)
                .bind(WithdrawStatus::Approved.as_str())
                .bind(request.id)
                .fetch_one(&mut *tx)
                .await?;

            sqlx::query(
                "UPDATE wallets
                 SET pending_balance = pending_balance - $1,
                     total_withdrawn = total_withdrawn + $1,
                     updated_at = NOW()
                 WHERE id = $2",
            )
            .bind(request.amount)
            .bind(request.wallet_id)
            .execute(&mut *tx)
            .await?;

            settle_pending_transaction(&mut tx, &request, TransactionStatus::Completed).await?;

            tx.commit().await?;

            log::info!(
                "Withdraw request {} approved by admin {}",
                request.id,
                actor.user_id
            );

            Ok(WithdrawRequest::from_row(&row)?)
        })
        .await
    }

    /// Reject a pending request and return the reserved funds
    ///
    /// # Arguments
    ///
    /// * `reason` - Recorded on the request; defaults to
    ///   [`DEFAULT_REJECTION_REASON`] when absent or blank
    ///
    /// # Errors
    ///
    /// Same as [`WithdrawManager::approve`].
    pub async fn reject(
        &self,
        actor: &Actor,
        request_id: Uuid,
        reason: Option<&str>,
    ) -> LedgerResult<WithdrawRequest> {
        actor.require(Capability::ManageWithdrawals)?;

        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REJECTION_REASON)
            .to_string();

        bounded(self.config.transaction_timeout, async {
            let mut tx = begin_atomic(&self.pool, self.config.lock_timeout).await?;

            let request = lock_pending_request(&mut tx, request_id).await?;
            ledger::lock_wallet(&mut tx, request.wallet_id).await?;

            let sql = format!(
                "UPDATE withdraw_requests \
                 SET status = $1, rejection_reason = $2, processed_at = NOW() \
                 WHERE id = $3 RETURNING {}",
                WithdrawRequest::COLUMNS
            );
            let row = sqlx::query(&sql)
                .bind(WithdrawStatus::Rejected.as_str())
                .bind(&reason)
                .bind(request.id)
                .fetch_one(&mut *tx)
                .await?;

            sqlx::query(
                "UPDATE wallets
                 SET pending_balance = pending_balance - $1,
                     balance = balance + $1,
                     updated_at = NOW()
                 WHERE id = $2",
            )
            .bind(request.amount)
            .bind(request.wallet_id)
            .execute(&mut *tx)
            .await?;

            settle_pending_transaction(&mut tx, &request, TransactionStatus::Cancelled).await?;

            // Funds return without counting as a new deposit
            let audit = AuditInfo::default();
            ledger::insert_transaction(
                &mut tx,
                NewTransaction {
                    withdraw_request_id: Some(request.id),
                    ..NewTransaction::completed(
                        request.wallet_id,
                        TransactionType::Deposit,
                        request.amount,
                        format!("Reversal: withdraw rejected - {reason}"),
                        &audit,
                    )
                },
            )
            .await?;

            tx.commit().await?;

            log::info!(
                "Withdraw request {} rejected by admin {}: {}",
                request.id,
                actor.user_id,
                reason
            );

            Ok(WithdrawRequest::from_row(&row)?)
        })
        .await
    }

    /// Get a withdraw request by id
    pub async fn get_request(&self, request_id: Uuid) -> LedgerResult<WithdrawRequest> {
        let sql = format!(
            "SELECT {} FROM withdraw_requests WHERE id = $1",
            WithdrawRequest::COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(request_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(LedgerError::NotFound(Resource::WithdrawRequest(request_id)))?;

        Ok(WithdrawRequest::from_row(&row)?)
    }

    /// A user's withdraw requests, newest first, with payout keys masked
    pub async fn get_withdraw_history(
        &self,
        user_id: i64,
        limit: i64,
    ) -> LedgerResult<Vec<WithdrawHistoryEntry>> {
        let sql = format!(
            "SELECT {} FROM withdraw_requests
             WHERE wallet_id = (SELECT id FROM wallets WHERE user_id = $1)
             ORDER BY created_at DESC
             LIMIT $2",
            WithdrawRequest::COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(limit.max(0))
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.iter()
            .map(|row| {
                WithdrawRequest::from_row(row)
                    .map(history_entry)
                    .map_err(LedgerError::from)
            })
            .collect()
    }

    /// Administrative listing, oldest first, optionally filtered by status
    ///
    /// # Arguments
    ///
    /// * `page` - 1-based page number
    /// * `per_page` - Page size, clamped to `1..=MAX_PAGE_SIZE`
    pub async fn list_withdraws(
        &self,
        actor: &Actor,
        status: Option<WithdrawStatus>,
        page: i64,
        per_page: i64,
    ) -> LedgerResult<WithdrawPage> {
        actor.require(Capability::ManageWithdrawals)?;

        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        let status = status.map(WithdrawStatus::as_str);

        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS total FROM withdraw_requests
             WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool.as_ref())
        .await?
        .try_get("total")?;

        let rows = sqlx::query(
            "SELECT wr.id, wr.wallet_id, wr.amount, wr.status, wr.payout_key_type,
                    wr.payout_key, wr.ip_address, wr.rejection_reason, wr.processed_at,
                    wr.created_at, u.id AS user_id, u.username, u.email
             FROM withdraw_requests wr
             JOIN wallets w ON w.id = wr.wallet_id
             JOIN users u ON u.id = w.user_id
             WHERE ($1::text IS NULL OR wr.status = $1)
             ORDER BY wr.created_at ASC
             LIMIT $2 OFFSET $3",
        )
        .bind(status)
        .bind(per_page)
        .bind(page_offset(page, per_page))
        .fetch_all(self.pool.as_ref())
        .await?;

        let withdraws = rows
            .iter()
            .map(|row| {
                Ok(AdminWithdrawView {
                    request: WithdrawRequest::from_row(row)?,
                    user_id: row.try_get("user_id")?,
                    username: row.try_get("username")?,
                    email: row.try_get("email")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(WithdrawPage {
            withdraws,
            total,
            page,
            per_page,
        })
    }
}

/// Rows skipped before `page`, saturating for absurd page numbers
fn page_offset(page: i64, per_page: i64) -> i64 {
    page.saturating_sub(1).saturating_mul(per_page)
}

/// Today's total towards the daily cap and whether an open request exists
async fn withdraw_activity(conn: &mut PgConnection, wallet_id: i64) -> LedgerResult<(Decimal, bool)> {
    let counted: Vec<&str> = WithdrawStatus::ALL
        .into_iter()
        .filter(|s| s.counts_toward_daily_limit())
        .map(WithdrawStatus::as_str)
        .collect();
    let open: Vec<&str> = WithdrawStatus::ALL
        .into_iter()
        .filter(|s| s.is_open())
        .map(WithdrawStatus::as_str)
        .collect();

    let row = sqlx::query(
        "SELECT
             COALESCE(SUM(amount) FILTER (WHERE created_at >= $2 AND status = ANY($3)), 0)
                 AS requested_today,
             COUNT(*) FILTER (WHERE status = ANY($4)) > 0 AS has_open
         FROM withdraw_requests
         WHERE wallet_id = $1",
    )
    .bind(wallet_id)
    .bind(policy::utc_day_start(Utc::now()))
    .bind(&counted)
    .bind(&open)
    .fetch_one(&mut *conn)
    .await?;

    Ok((row.try_get("requested_today")?, row.try_get("has_open")?))
}

/// Lock a request row and check it is still PENDING
async fn lock_pending_request(
    conn: &mut PgConnection,
    request_id: Uuid,
) -> LedgerResult<WithdrawRequest> {
    let sql = format!(
        "SELECT {} FROM withdraw_requests WHERE id = $1 FOR UPDATE",
        WithdrawRequest::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(request_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(LedgerError::NotFound(Resource::WithdrawRequest(request_id)))?;

    let request = WithdrawRequest::from_row(&row)?;
    if request.status != WithdrawStatus::Pending {
        return Err(LedgerError::NotPending(request_id));
    }

    Ok(request)
}

/// Move the PENDING WITHDRAW transaction of a request to its final status
///
/// Transactions linked to the request are preferred; unlinked rows are matched
/// on wallet and amount.
async fn settle_pending_transaction(
    conn: &mut PgConnection,
    request: &WithdrawRequest,
    status: TransactionStatus,
) -> LedgerResult<()> {
    let updated = sqlx::query(
        "UPDATE transactions SET status = $1, updated_at = NOW()
         WHERE id = (
             SELECT id FROM transactions
             WHERE wallet_id = $2
               AND transaction_type = 'WITHDRAW'
               AND status = 'PENDING'
               AND (withdraw_request_id = $3
                    OR (withdraw_request_id IS NULL AND amount = $4))
             ORDER BY withdraw_request_id IS NULL, created_at
             LIMIT 1
         )",
    )
    .bind(status.as_str())
    .bind(request.wallet_id)
    .bind(request.id)
    .bind(request.amount)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        log::warn!(
            "No pending transaction found for withdraw request {}",
            request.id
        );
    }

    Ok(())
}

fn open_request_conflict(err: sqlx::Error) -> LedgerError {
    let conflict = err
        .as_database_error()
        .and_then(|db_err| db_err.constraint())
        .is_some_and(|name| name == ONE_OPEN_REQUEST_INDEX);

    if conflict {
        LedgerError::RequestAlreadyPending
    } else {
        LedgerError::from(err)
    }
}

fn history_entry(request: WithdrawRequest) -> WithdrawHistoryEntry {
    let rejection_reason =
        (request.status == WithdrawStatus::Rejected).then_some(request.rejection_reason);

    WithdrawHistoryEntry {
        id: request.id,
        amount: request.amount,
        status: request.status,
        payout_key_type: request.payout_key_type,
        payout_key: policy::mask_payout_key(&request.payout_key),
        rejection_reason,
        created_at: request.created_at,
        processed_at: request.processed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::withdraw::PayoutKeyType;
    use rust_decimal_macros::dec;

    fn request(status: WithdrawStatus) -> WithdrawRequest {
        WithdrawRequest {
            id: Uuid::new_v4(),
            wallet_id: 7,
            amount: dec!(75.00),
            status,
            payout_key_type: PayoutKeyType::Email,
            payout_key: "seller@example.com".to_string(),
            ip_address: None,
            rejection_reason: "Invalid key".to_string(),
            processed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_history_entry_masks_key() {
        let entry = history_entry(request(WithdrawStatus::Pending));
        assert_eq!(entry.payout_key, "sel***com");
        assert_eq!(entry.rejection_reason, None);
    }

    #[test]
    fn test_history_entry_shows_reason_only_when_rejected() {
        let entry = history_entry(request(WithdrawStatus::Rejected));
        assert_eq!(entry.rejection_reason.as_deref(), Some("Invalid key"));

        let entry = history_entry(request(WithdrawStatus::Approved));
        assert_eq!(entry.rejection_reason, None);
    }

    #[test]
    fn test_non_constraint_errors_keep_their_kind() {
        let err = open_request_conflict(sqlx::Error::RowNotFound);
        assert!(matches!(err, LedgerError::Database(_)));
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(i64::MAX, MAX_PAGE_SIZE), i64::MAX);
    }
}
