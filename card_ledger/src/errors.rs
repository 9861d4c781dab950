//! Ledger error types.

use rust_decimal::Decimal;
use std::{fmt, time::Duration};
use thiserror::Error;
use uuid::Uuid;

/// SQLSTATE codes that mean "another unit held the rows, try again".
const RETRYABLE_SQLSTATES: [&str; 3] = [
    "55P03", // lock_not_available (lock_timeout elapsed)
    "40P01", // deadlock_detected
    "40001", // serialization_failure
];

/// Entity a [`LedgerError::NotFound`] refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    User(i64),
    /// Wallet looked up by its owning user
    Wallet(i64),
    Listing(i64),
    WithdrawRequest(Uuid),
    Order(Uuid),
    ReferralCode(i64),
}

impl Resource {
    fn kind(&self) -> &'static str {
        match self {
            Resource::User(_) => "User",
            Resource::Wallet(_) => "Wallet",
            Resource::Listing(_) => "Listing",
            Resource::WithdrawRequest(_) => "Withdraw request",
            Resource::Order(_) => "Order",
            Resource::ReferralCode(_) => "Referral code",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::User(id) => write!(f, "User {id}"),
            Resource::Wallet(user_id) => write!(f, "Wallet for user {user_id}"),
            Resource::Listing(id) => write!(f, "Listing {id}"),
            Resource::WithdrawRequest(id) => write!(f, "Withdraw request {id}"),
            Resource::Order(id) => write!(f, "Order {id}"),
            Resource::ReferralCode(user_id) => write!(f, "Referral code for user {user_id}"),
        }
    }
}

/// Ledger errors
///
/// Every variant is recoverable at the operation boundary. None of them leaves
/// partially applied state behind: they are raised before commit, so the
/// surrounding database transaction is rolled back.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Lock wait, deadlock or serialization conflict
    #[error("Concurrent update conflict, retry the operation: {0}")]
    Retryable(sqlx::Error),

    /// Atomic unit exceeded its time budget
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Amount must be positive with at most two decimal places
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Quantity must be at least one
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i32),

    /// Insufficient balance
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Decimal, required: Decimal },

    /// Requested more units than the listing holds
    #[error("Insufficient stock for {card_name}: available {available}, requested {requested}")]
    InsufficientStock {
        listing_id: i64,
        card_name: String,
        available: i32,
        requested: i32,
    },

    /// Buyer is the listing's seller
    #[error("Cannot purchase your own listing: {card_name}")]
    SelfPurchase { listing_id: i64, card_name: String },

    /// Listing missing, sold or cancelled
    #[error("Listing {0} is no longer available")]
    ListingUnavailable(i64),

    /// Shipping address missing or owned by someone else
    #[error("Address {0} not found")]
    AddressNotFound(i64),

    /// Cart without items
    #[error("Cart is empty")]
    EmptyCart,

    /// Amount under a configured minimum
    #[error("Amount {amount} is below the minimum of {minimum}")]
    BelowMinimum { amount: Decimal, minimum: Decimal },

    /// Daily withdraw cap would be exceeded
    #[error("Daily withdraw limit exceeded, remaining today: {remaining}")]
    DailyLimitExceeded { remaining: Decimal },

    /// Wallet already has an open withdraw request
    #[error("A withdraw request is already being processed")]
    RequestAlreadyPending,

    /// Withdraw request already approved or rejected
    #[error("Withdraw request {0} is not pending")]
    NotPending(Uuid),

    /// Entity not found
    #[error("{0} not found")]
    NotFound(Resource),

    /// Actor lacks the capability for the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Every generated referral code collided with an existing one
    #[error("Could not generate a unique referral code after {0} attempts")]
    CodeGenerationFailed(u32),
}

impl LedgerError {
    /// Whether the caller may retry the same operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Retryable(_) | LedgerError::Timeout(_))
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database errors are sanitized and identifiers of missing entities are
    /// redacted.
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Database(_) => "Internal server error".to_string(),
            LedgerError::Retryable(_) | LedgerError::Timeout(_) => {
                "Service busy, please try again".to_string()
            }
            LedgerError::NotFound(resource) => format!("{} not found", resource.kind()),
            LedgerError::CodeGenerationFailed(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        let retryable = err
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .is_some_and(|code| RETRYABLE_SQLSTATES.contains(&code.as_ref()));

        if retryable {
            LedgerError::Retryable(err)
        } else {
            LedgerError::Database(err)
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// A stored enum column held a value this build does not know
#[derive(Debug, Error)]
#[error("Unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Decode a text column into one of the ledger's enums
pub(crate) fn decode_enum<T>(raw: String) -> Result<T, sqlx::Error>
where
    T: std::str::FromStr<Err = UnknownVariant>,
{
    raw.parse().map_err(|e: UnknownVariant| sqlx::Error::Decode(Box::new(e)))
}
