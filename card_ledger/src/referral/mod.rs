//! Referral codes and referral bonuses.
//!
//! Every account owns one code. A new user who registers with someone else's
//! active code triggers a bonus for both sides; unknown or inactive codes are
//! ignored without failing the registration.

pub mod engine;
pub mod manager;
pub mod models;

pub use engine::{CODE_LENGTH, generate_code, normalize_code};
pub use manager::ReferralManager;
pub use models::{Referral, ReferralCode, ReferralInfo, ReferredUser};
