//! Account registration and lookup.
//!
//! Registration is the use case that brings a wallet into existence. It
//! creates the user, the wallet, the user's own referral code and the welcome
//! bonus together, and redeems a referral code when one is given. Password
//! hashing uses Argon2id with a server-side pepper.
//!
//! ## Example
//!
//! ```no_run
//! use card_ledger::{LedgerConfig, accounts::{AccountManager, RegisterRequest}, db::Database};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let accounts = AccountManager::new(
//!         Arc::new(db.pool().clone()),
//!         Arc::new(LedgerConfig::default()),
//!         "pepper".to_string(),
//!     );
//!
//!     let registration = accounts
//!         .register(RegisterRequest {
//!             username: "card_fan".to_string(),
//!             email: "fan@example.com".to_string(),
//!             password: "Secret123".to_string(),
//!             referral_code: Some("AB12CD34".to_string()),
//!             audit: Default::default(),
//!         })
//!         .await?;
//!     println!("Starting balance: {}", registration.balance);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{AccountError, AccountResult};
pub use manager::AccountManager;
pub use models::{RegisterRequest, Registration, User};
