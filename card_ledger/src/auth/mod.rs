//! Roles and the capability gate for privileged ledger operations.
//!
//! The ledger never trusts a boolean "is admin" flag passed by the caller.
//! Privileged operations take an [`Actor`] (the authenticated user and their
//! stored [`Role`]) and check it against the [`Capability`] they need before
//! touching any row.
//!
//! ## Example
//!
//! ```
//! use card_ledger::auth::{Actor, Capability, Role};
//!
//! let admin = Actor::new(1, Role::Admin);
//! assert!(admin.require(Capability::ManageWithdrawals).is_ok());
//!
//! let user = Actor::new(2, Role::User);
//! assert!(user.require(Capability::ManageWithdrawals).is_err());
//! ```

pub mod models;
pub mod store;

pub use models::{Actor, Capability, Role, UserId};
pub use store::load_actor;
