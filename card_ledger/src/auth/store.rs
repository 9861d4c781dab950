//! Role lookup for authenticated callers.

use super::models::{Actor, UserId};
use crate::errors::{LedgerError, LedgerResult, Resource, decode_enum};
use sqlx::{PgPool, Row};

/// Build the [`Actor`] for `user_id` from the role stored on the user row
///
/// # Errors
///
/// * `LedgerError::NotFound` - Unknown user
pub async fn load_actor(pool: &PgPool, user_id: UserId) -> LedgerResult<Actor> {
    let row = sqlx::query("SELECT role FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(LedgerError::NotFound(Resource::User(user_id)))?;

    let role = decode_enum(row.try_get("role")?)?;
    Ok(Actor::new(user_id, role))
}
