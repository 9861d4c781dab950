//! Structured logging configuration.
//!
//! The library logs through the `log` facade; the subscriber installed here
//! also captures those records.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var; `verbose` only
/// changes the default filter.
pub fn init(verbose: bool) {
    let default_filter = if verbose {
        "debug,sqlx=warn"
    } else {
        "info,sqlx=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Log an administrative action with structured data
pub fn log_admin_action(admin_user_id: i64, action: &str, target: &str) {
    tracing::info!(
        admin_user_id = admin_user_id,
        action = action,
        target = target,
        "ADMIN: {} {}",
        action,
        target
    );
}
