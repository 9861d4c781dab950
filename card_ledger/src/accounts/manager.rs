//! Account manager implementation.

use super::{
    errors::{AccountError, AccountResult},
    models::{RegisterRequest, Registration, User},
};
use crate::{
    auth::{Actor, Capability, Role, UserId, load_actor},
    config::LedgerConfig,
    db::{begin_atomic, timeouts::bounded},
    errors::{LedgerError, Resource},
    referral::engine as referral,
    wallet::ledger,
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use std::sync::Arc;

/// Longest accepted email address
const MAX_EMAIL_LEN: usize = 255;

/// Account manager
#[derive(Clone)]
pub struct AccountManager {
    pool: Arc<PgPool>,
    config: Arc<LedgerConfig>,
    pepper: String,
}

impl AccountManager {
    /// Create a new account manager
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `config` - Ledger configuration (bonus amounts, timeouts)
    /// * `pepper` - Server-side pepper for password hashing
    pub fn new(pool: Arc<PgPool>, config: Arc<LedgerConfig>, pepper: String) -> Self {
        Self {
            pool,
            config,
            pepper,
        }
    }

    /// Register a new user
    ///
    /// In one atomic unit: creates the user, their wallet and referral code,
    /// credits the welcome bonus and, when a valid referral code is supplied,
    /// pays both referral bonuses. Invalid referral codes do not fail the
    /// registration.
    ///
    /// # Errors
    ///
    /// * `AccountError::InvalidUsername` - Username format invalid
    /// * `AccountError::WeakPassword` - Password too weak
    /// * `AccountError::InvalidEmail` - Email format invalid
    /// * `AccountError::UsernameTaken` - Username already exists
    /// * `AccountError::EmailTaken` - Email already exists
    pub async fn register(&self, request: RegisterRequest) -> AccountResult<Registration> {
        let username = request.username.trim();
        let email = request.email.trim().to_lowercase();

        self.validate_username(username)?;
        self.validate_password(&request.password)?;
        self.validate_email(&email)?;

        let existing_user = sqlx::query("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(self.pool.as_ref())
            .await?;
        if existing_user.is_some() {
            return Err(AccountError::UsernameTaken);
        }

        let existing_email = sqlx::query("SELECT id FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(self.pool.as_ref())
            .await?;
        if existing_email.is_some() {
            return Err(AccountError::EmailTaken);
        }

        let password_hash = self.hash_password(&request.password)?;

        let unit = self.create_account(username, &email, &password_hash, &request);
        let registration =
            bounded(self.config.transaction_timeout, async { Ok(unit.await) }).await??;

        log::info!(
            "Registered user {} ({}), referral applied: {}",
            registration.user.id,
            registration.user.username,
            registration.referral_applied
        );

        Ok(registration)
    }

    /// Check a username and password pair
    ///
    /// # Errors
    ///
    /// * `AccountError::InvalidCredentials` - Unknown user or wrong password
    pub async fn verify_credentials(&self, username: &str, password: &str) -> AccountResult<User> {
        let sql = format!(
            "SELECT {}, password_hash FROM users WHERE username = $1",
            User::COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(username.trim())
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        let password_hash: String = row.try_get("password_hash")?;
        self.verify_password(password, &password_hash)?;

        Ok(User::from_row(&row)?)
    }

    /// Get a user by id
    pub async fn get_user(&self, user_id: UserId) -> AccountResult<User> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", User::COLUMNS);
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(LedgerError::NotFound(Resource::User(user_id)))?;

        Ok(User::from_row(&row)?)
    }

    /// Build the actor for an authenticated user from their stored role
    pub async fn actor(&self, user_id: UserId) -> AccountResult<Actor> {
        Ok(load_actor(&self.pool, user_id).await?)
    }

    /// Change a user's role
    ///
    /// # Errors
    ///
    /// * `LedgerError::PermissionDenied` - Actor may not manage roles
    /// * `LedgerError::NotFound` - Unknown user
    pub async fn set_role(&self, actor: &Actor, user_id: UserId, role: Role) -> AccountResult<User> {
        actor.require(Capability::ManageRoles)?;

        let sql = format!(
            "UPDATE users SET role = $1 WHERE id = $2 RETURNING {}",
            User::COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(role.as_str())
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(LedgerError::NotFound(Resource::User(user_id)))?;

        log::info!("User {} set role of user {} to {}", actor.user_id, user_id, role);

        Ok(User::from_row(&row)?)
    }

    async fn create_account(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        request: &RegisterRequest,
    ) -> AccountResult<Registration> {
        let mut tx = begin_atomic(&self.pool, self.config.lock_timeout).await?;

        let sql = format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            User::COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(duplicate_account)?;
        let user = User::from_row(&row)?;

        let wallet_id: i64 = sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) RETURNING id")
            .bind(user.id)
            .fetch_one(&mut *tx)
            .await?
            .try_get("id")?;

        let own_code = referral::create_code(&mut tx, user.id).await?;

        if self.config.welcome_bonus > Decimal::ZERO {
            ledger::deposit(
                &mut tx,
                wallet_id,
                self.config.welcome_bonus,
                "Welcome bonus".to_string(),
                true,
                &request.audit,
            )
            .await?;
        }

        let mut referral_applied = false;
        if let Some(code) = request
            .referral_code
            .as_deref()
            .and_then(referral::normalize_code)
        {
            referral_applied = referral::redeem(
                &mut tx,
                &self.config,
                &code,
                user.id,
                &user.username,
                &request.audit,
            )
            .await?
            .is_some();
        }

        let balance: Decimal = sqlx::query("SELECT balance FROM wallets WHERE id = $1")
            .bind(wallet_id)
            .fetch_one(&mut *tx)
            .await?
            .try_get("balance")?;

        tx.commit().await?;

        Ok(Registration {
            user,
            balance,
            referral_code: own_code.code,
            referral_applied,
        })
    }

    /// Hash password with Argon2id + pepper
    fn hash_password(&self, password: &str) -> AccountResult<String> {
        let peppered = format!("{}{}", password, self.pepper);
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        Ok(argon2
            .hash_password(peppered.as_bytes(), &salt)
            .map_err(|_| AccountError::HashingFailed)?
            .to_string())
    }

    /// Verify password against hash
    fn verify_password(&self, password: &str, hash: &str) -> AccountResult<()> {
        let peppered = format!("{}{}", password, self.pepper);
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AccountError::InvalidCredentials)?;
        let argon2 = Argon2::default();

        argon2
            .verify_password(peppered.as_bytes(), &parsed_hash)
            .map_err(|_| AccountError::InvalidCredentials)
    }

    /// Validate username format
    fn validate_username(&self, username: &str) -> AccountResult<()> {
        let len = username.chars().count();
        if !(3..=20).contains(&len) {
            return Err(AccountError::InvalidUsername(
                "Username must be 3-20 characters".to_string(),
            ));
        }

        if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AccountError::InvalidUsername(
                "Username can only contain letters, numbers, and underscores".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate password strength
    fn validate_password(&self, password: &str) -> AccountResult<()> {
        if password.len() < 8 {
            return Err(AccountError::WeakPassword(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        // Check for at least one number, one uppercase, one lowercase
        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
        let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());

        if !has_digit || !has_uppercase || !has_lowercase {
            return Err(AccountError::WeakPassword(
                "Password must contain at least one number, one uppercase and one lowercase letter"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Validate email shape: one `@`, non-empty local part, dotted domain
    fn validate_email(&self, email: &str) -> AccountResult<()> {
        if email.len() > MAX_EMAIL_LEN {
            return Err(AccountError::InvalidEmail("Email is too long".to_string()));
        }

        let valid = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !email.chars().any(char::is_whitespace)
            }
            None => false,
        };

        if !valid {
            return Err(AccountError::InvalidEmail(
                "Email must look like name@example.com".to_string(),
            ));
        }

        Ok(())
    }
}

/// Map a unique violation on the user row to the matching account error
fn duplicate_account(err: sqlx::Error) -> AccountError {
    match err.as_database_error().and_then(|db_err| db_err.constraint()) {
        Some("users_username_key") => AccountError::UsernameTaken,
        Some("users_email_key") => AccountError::EmailTaken,
        _ => AccountError::from(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn manager() -> AccountManager {
        // Validators never touch the pool
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/card_ledger_unused")
            .unwrap();
        AccountManager::new(
            Arc::new(pool),
            Arc::new(LedgerConfig::default()),
            "pepper".to_string(),
        )
    }

    #[tokio::test]
    async fn test_validate_username() {
        let manager = manager();
        assert!(manager.validate_username("card_fan_99").is_ok());
        assert!(matches!(
            manager.validate_username("ab"),
            Err(AccountError::InvalidUsername(_))
        ));
        assert!(matches!(
            manager.validate_username("has space"),
            Err(AccountError::InvalidUsername(_))
        ));
        assert!(manager.validate_username(&"a".repeat(21)).is_err());
    }

    #[tokio::test]
    async fn test_validate_password() {
        let manager = manager();
        assert!(manager.validate_password("Secret123").is_ok());
        assert!(matches!(
            manager.validate_password("Sh0rt"),
            Err(AccountError::WeakPassword(_))
        ));
        assert!(manager.validate_password("alllowercase1").is_err());
        assert!(manager.validate_password("NoDigitsHere").is_err());
    }

    #[tokio::test]
    async fn test_validate_email() {
        let manager = manager();
        assert!(manager.validate_email("player@example.com").is_ok());
        assert!(manager.validate_email("player@localhost").is_err());
        assert!(manager.validate_email("@example.com").is_err());
        assert!(manager.validate_email("a@b@example.com").is_err());
        assert!(manager.validate_email("play er@example.com").is_err());
    }

    #[tokio::test]
    async fn test_password_hash_round_trip_uses_pepper() {
        let manager = manager();
        let hash = manager.hash_password("Secret123").unwrap();
        assert!(manager.verify_password("Secret123", &hash).is_ok());
        assert!(matches!(
            manager.verify_password("Secret124", &hash),
            Err(AccountError::InvalidCredentials)
        ));

        let other = AccountManager {
            pepper: "different".to_string(),
            ..manager.clone()
        };
        assert!(other.verify_password("Secret123", &hash).is_err());
    }
}
