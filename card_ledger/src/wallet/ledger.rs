//! Balance primitives that run inside a caller's open transaction.
//!
//! Nothing here commits. Callers begin the unit with
//! [`begin_atomic`](crate::db::begin_atomic), lock the wallets they will touch,
//! compose these primitives and commit once at the end.

use super::models::{AuditInfo, Transaction, TransactionStatus, TransactionType, Wallet};
use crate::errors::{LedgerError, LedgerResult, Resource};
use crate::money::validate_amount;
use rust_decimal::Decimal;
use sqlx::{PgConnection, Row};
use std::collections::HashMap;
use uuid::Uuid;

/// Longest description the transactions table stores, in characters
pub const DESCRIPTION_MAX_CHARS: usize = 255;

/// Audit row about to be appended
pub(crate) struct NewTransaction<'a> {
    pub wallet_id: i64,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub description: String,
    pub status: TransactionStatus,
    pub related_listing_id: Option<i64>,
    pub withdraw_request_id: Option<Uuid>,
    pub audit: &'a AuditInfo,
}

impl<'a> NewTransaction<'a> {
    pub fn completed(
        wallet_id: i64,
        transaction_type: TransactionType,
        amount: Decimal,
        description: String,
        audit: &'a AuditInfo,
    ) -> Self {
        Self {
            wallet_id,
            transaction_type,
            amount,
            description,
            status: TransactionStatus::Completed,
            related_listing_id: None,
            withdraw_request_id: None,
            audit,
        }
    }
}

/// Lock and read the wallet owned by `user_id`
pub(crate) async fn lock_wallet_for_user(
    conn: &mut PgConnection,
    user_id: i64,
) -> LedgerResult<Wallet> {
    let sql = format!(
        "SELECT {} FROM wallets WHERE user_id = $1 FOR UPDATE",
        Wallet::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(LedgerError::NotFound(Resource::Wallet(user_id)))?;

    Ok(Wallet::from_row(&row)?)
}

/// Lock and read the wallet with primary key `wallet_id`
pub(crate) async fn lock_wallet(conn: &mut PgConnection, wallet_id: i64) -> LedgerResult<Wallet> {
    let sql = format!("SELECT {} FROM wallets WHERE id = $1 FOR UPDATE", Wallet::COLUMNS);
    // Wallet ids come from rows that reference the wallet, so it must exist
    let row = sqlx::query(&sql).bind(wallet_id).fetch_one(&mut *conn).await?;

    Ok(Wallet::from_row(&row)?)
}

/// Lock the wallets of several users, keyed by user id
///
/// Rows are locked in ascending user id order so that two settlements touching
/// the same wallets cannot deadlock each other.
pub(crate) async fn lock_wallets_for_users(
    conn: &mut PgConnection,
    user_ids: &[i64],
) -> LedgerResult<HashMap<i64, Wallet>> {
    let mut ids = user_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let sql = format!(
        "SELECT {} FROM wallets WHERE user_id = ANY($1) ORDER BY user_id FOR UPDATE",
        Wallet::COLUMNS
    );
    let rows = sqlx::query(&sql).bind(&ids).fetch_all(&mut *conn).await?;

    let mut wallets = HashMap::with_capacity(rows.len());
    for row in &rows {
        let wallet = Wallet::from_row(row)?;
        wallets.insert(wallet.user_id, wallet);
    }

    if let Some(missing) = ids.iter().find(|id| !wallets.contains_key(id)) {
        return Err(LedgerError::NotFound(Resource::Wallet(*missing)));
    }

    Ok(wallets)
}

/// Cut `description` to [`DESCRIPTION_MAX_CHARS`] on a char boundary
pub(crate) fn clamp_description(mut description: String) -> String {
    if let Some((end, _)) = description.char_indices().nth(DESCRIPTION_MAX_CHARS) {
        description.truncate(end);
    }
    description
}

/// Append an audit row
///
/// Descriptions built from free text are clamped to the column width.
pub(crate) async fn insert_transaction(
    conn: &mut PgConnection,
    new: NewTransaction<'_>,
) -> LedgerResult<Transaction> {
    let description = clamp_description(new.description);
    let sql = format!(
        "INSERT INTO transactions (wallet_id, transaction_type, amount, description, status, \
             related_listing_id, withdraw_request_id, ip_address, user_agent) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {}",
        Transaction::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(new.wallet_id)
        .bind(new.transaction_type.as_str())
        .bind(new.amount)
        .bind(&description)
        .bind(new.status.as_str())
        .bind(new.related_listing_id)
        .bind(new.withdraw_request_id)
        .bind(&new.audit.ip_address)
        .bind(&new.audit.user_agent)
        .fetch_one(&mut *conn)
        .await?;

    Ok(Transaction::from_row(&row)?)
}

/// Credit a wallet and log a DEPOSIT (or BONUS) entry
///
/// Bonus credits do not count towards `total_deposited`.
pub(crate) async fn deposit(
    conn: &mut PgConnection,
    wallet_id: i64,
    amount: Decimal,
    description: String,
    bonus: bool,
    audit: &AuditInfo,
) -> LedgerResult<Transaction> {
    let amount = validate_amount(amount)?;
    let deposited = if bonus { Decimal::ZERO } else { amount };

    let updated = sqlx::query(
        "UPDATE wallets
         SET balance = balance + $1,
             total_deposited = total_deposited + $2,
             updated_at = NOW()
         WHERE id = $3",
    )
    .bind(amount)
    .bind(deposited)
    .bind(wallet_id)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(LedgerError::Database(sqlx::Error::RowNotFound));
    }

    let transaction_type = if bonus {
        TransactionType::Bonus
    } else {
        TransactionType::Deposit
    };

    insert_transaction(
        conn,
        NewTransaction::completed(wallet_id, transaction_type, amount, description, audit),
    )
    .await
}

/// Debit a wallet and log a completed WITHDRAW entry
pub(crate) async fn withdraw(
    conn: &mut PgConnection,
    wallet_id: i64,
    amount: Decimal,
    description: String,
    audit: &AuditInfo,
) -> LedgerResult<Transaction> {
    let amount = validate_amount(amount)?;

    debit_balance(conn, wallet_id, amount).await?;

    sqlx::query(
        "UPDATE wallets SET total_withdrawn = total_withdrawn + $1, updated_at = NOW() WHERE id = $2",
    )
    .bind(amount)
    .bind(wallet_id)
    .execute(&mut *conn)
    .await?;

    insert_transaction(
        conn,
        NewTransaction::completed(
            wallet_id,
            TransactionType::Withdraw,
            amount,
            description,
            audit,
        ),
    )
    .await
}

/// Remove `amount` from the available balance, returning the new balance
///
/// Check and update happen in one statement so the balance can never go
/// negative, even if a caller forgot to lock the row first.
pub(crate) async fn debit_balance(
    conn: &mut PgConnection,
    wallet_id: i64,
    amount: Decimal,
) -> LedgerResult<Decimal> {
    let row = sqlx::query(
        "UPDATE wallets
         SET balance = balance - $1, updated_at = NOW()
         WHERE id = $2 AND balance >= $1
         RETURNING balance",
    )
    .bind(amount)
    .bind(wallet_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(row.try_get("balance")?),
        None => {
            let available: Decimal = sqlx::query("SELECT balance FROM wallets WHERE id = $1")
                .bind(wallet_id)
                .fetch_one(&mut *conn)
                .await?
                .try_get("balance")?;

            Err(LedgerError::InsufficientBalance {
                available,
                required: amount,
            })
        }
    }
}

/// Add `amount` to the available balance, returning the new balance
pub(crate) async fn credit_balance(
    conn: &mut PgConnection,
    wallet_id: i64,
    amount: Decimal,
) -> LedgerResult<Decimal> {
    let row = sqlx::query(
        "UPDATE wallets
         SET balance = balance + $1, updated_at = NOW()
         WHERE id = $2
         RETURNING balance",
    )
    .bind(amount)
    .bind(wallet_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.try_get("balance")?)
}
