//! Withdraw requests: users reserve funds for a payout, administrators
//! approve or reject.
//!
//! A request moves the amount from `balance` to `pending_balance`. Approval
//! releases the reservation as a completed withdrawal; rejection returns it to
//! the available balance with a reversal entry.

pub mod manager;
pub mod models;
pub mod policy;

pub use manager::WithdrawManager;
pub use models::{
    AdminWithdrawView, NewWithdrawRequest, PayoutKeyType, WithdrawHistoryEntry, WithdrawPage,
    WithdrawRequest, WithdrawStatus,
};
