//! # Card Ledger
//!
//! Wallet ledger and marketplace settlement core for a trading card marketplace.
//!
//! Every operation that moves value (deposits, withdrawals, purchases, checkouts,
//! referral bonuses) runs as one PostgreSQL transaction: rows are locked, the
//! preconditions are checked against the locked state, balances are mutated and
//! an audit [`Transaction`](wallet::Transaction) row is appended per balance
//! change before the unit commits. A failure anywhere before commit rolls the
//! whole unit back.
//!
//! ## Core Modules
//!
//! - [`wallet`]: wallet aggregate, deposit/withdraw primitives, transaction log
//! - [`withdraw`]: withdraw request workflow (request, approve, reject)
//! - [`market`]: settlement engine for purchase, batch purchase and checkout
//! - [`accounts`]: account registration use case (wallet, referral code, bonuses)
//! - [`referral`]: referral code redemption and referral info
//! - [`auth`]: roles and the capability gate for privileged operations
//! - [`db`]: connection pool, migrations and atomic-unit helpers
//!
//! ## Example
//!
//! ```no_run
//! use card_ledger::{LedgerConfig, db::{Database, DatabaseConfig}, wallet::WalletManager};
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&DatabaseConfig::default()).await?;
//!     db.migrate().await?;
//!
//!     let config = Arc::new(LedgerConfig::default());
//!     let wallets = WalletManager::new(Arc::new(db.pool().clone()), config);
//!
//!     let tx = wallets
//!         .deposit(1, Decimal::new(1000, 2), "Token deposit", false)
//!         .await?;
//!     println!("Recorded {} of {}", tx.transaction_type, tx.amount);
//!     Ok(())
//! }
//! ```

pub mod accounts;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod market;
pub mod money;
pub mod referral;
pub mod wallet;
pub mod withdraw;

pub use config::{ConfigError, LedgerConfig};
pub use errors::{LedgerError, LedgerResult, Resource};
