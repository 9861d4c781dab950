//! Operator configuration.
//!
//! Consolidates all environment variable reads for the CLI and validates them
//! before any connection is opened.

use card_ledger::{ConfigError, LedgerConfig, db::DatabaseConfig};

/// Complete CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Monetary policy and atomic-unit budgets
    pub ledger: LedgerConfig,
    /// User the CLI acts as; their stored role decides what is allowed
    pub admin_user_id: Option<i64>,
}

impl AdminConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `admin_override` - Optional acting user override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        database_url_override: Option<String>,
        admin_override: Option<i64>,
    ) -> Result<Self, ConfigError> {
        let database = match database_url_override {
            Some(url) => DatabaseConfig::with_url(url),
            None => DatabaseConfig::from_env()?,
        };

        let ledger = LedgerConfig::from_env()?;

        let admin_user_id = match admin_override {
            Some(id) => Some(id),
            None => std::env::var("LEDGER_ADMIN_USER_ID")
                .ok()
                .map(|raw| parse_admin_user_id(Some(raw)))
                .transpose()?,
        };

        Ok(Self {
            database,
            ledger,
            admin_user_id,
        })
    }

    /// The acting admin, required by privileged commands
    pub fn acting_user_id(&self) -> Result<i64, ConfigError> {
        match self.admin_user_id {
            Some(id) => Ok(id),
            None => parse_admin_user_id(None),
        }
    }
}

fn parse_admin_user_id(raw: Option<String>) -> Result<i64, ConfigError> {
    let raw = raw.ok_or_else(|| ConfigError::MissingRequired {
        var: "LEDGER_ADMIN_USER_ID".to_string(),
        hint: "Set it to the id of an admin account, or pass --as <id>".to_string(),
    })?;

    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ConfigError::Invalid {
            var: "LEDGER_ADMIN_USER_ID".to_string(),
            reason: format!("Expected a positive user id, got {raw:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_user_id_required() {
        let err = parse_admin_user_id(None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { .. }));
        assert!(err.to_string().contains("LEDGER_ADMIN_USER_ID"));
    }

    #[test]
    fn test_admin_user_id_parsed() {
        assert_eq!(parse_admin_user_id(Some(" 42 ".to_string())).unwrap(), 42);
    }

    #[test]
    fn test_admin_user_id_rejects_garbage() {
        for raw in ["abc", "0", "-3", ""] {
            let err = parse_admin_user_id(Some(raw.to_string())).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }));
        }
    }
}
