//! Wallet module: per-user balance aggregate and the append-only transaction log.
//!
//! This module implements:
//! - Deposit and withdraw primitives with audit entries
//! - Guarded balance updates that can never drive a balance negative
//! - Administrative balance adjustment behind the capability gate
//! - Wallet summary and transaction history reads
//!
//! ## Example
//!
//! ```no_run
//! use card_ledger::{LedgerConfig, db::Database, wallet::WalletManager};
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let wallets = WalletManager::new(Arc::new(db.pool().clone()), Arc::new(LedgerConfig::default()));
//!
//!     wallets.deposit(1, Decimal::new(1000, 2), "Token deposit", false).await?;
//!     let summary = wallets.get_wallet_summary(1).await?;
//!     println!("Balance: {}", summary.wallet.balance);
//!     Ok(())
//! }
//! ```

pub(crate) mod ledger;
pub mod manager;
pub mod models;

pub use ledger::DESCRIPTION_MAX_CHARS;
pub use manager::{DEFAULT_HISTORY_LIMIT, WalletManager};
pub use models::{
    AuditInfo, Transaction, TransactionStatus, TransactionType, Wallet, WalletSummary,
};
