//! Account error types.

use crate::errors::LedgerError;
use thiserror::Error;

/// Account errors
#[derive(Debug, Error)]
pub enum AccountError {
    /// Failure inside the ledger unit (database, timeout, wallet)
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Password hashing failed
    #[error("Password hashing failed")]
    HashingFailed,

    /// Unknown user or wrong password
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Username already exists
    #[error("Username already exists")]
    UsernameTaken,

    /// Email already exists
    #[error("Email already exists")]
    EmailTaken,

    /// Invalid username format
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// Invalid email format
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Password too weak
    #[error("Password too weak: {0}")]
    WeakPassword(String),
}

impl AccountError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            AccountError::Ledger(err) => err.client_message(),
            _ => self.to_string(),
        }
    }
}

impl From<sqlx::Error> for AccountError {
    fn from(err: sqlx::Error) -> Self {
        AccountError::Ledger(LedgerError::from(err))
    }
}

/// Result type for account operations
pub type AccountResult<T> = Result<T, AccountError>;
