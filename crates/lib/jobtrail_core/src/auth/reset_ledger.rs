//! Password-reset token ledger.
//!
//! At most one usable reset token per user: creating a new one deletes all
//! prior rows for that user in the same transaction. The token itself is a
//! random value handed to the user out of band; only its SHA-256 digest is
//! stored, and lookup is by digest equality (unlike the refresh ledger, the
//! digest is deterministic, so no per-user scan is needed).

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::ResetTokenRecord;
use crate::uuid::uuidv7;

/// Reset token lifetime: 1 hour.
pub const RESET_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Generate a random reset token (32 bytes, URL-safe base64).
pub fn generate_token() -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 digest of a reset token, hex encoded.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Replace any outstanding reset rows for a user with a single fresh one.
///
/// Delete and insert run in one transaction so concurrent requests cannot
/// leave two active rows behind.
pub async fn replace_for_user(
    pool: &PgPool,
    user_id: i64,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), AuthError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "INSERT INTO password_reset_tokens (id, user_id, token_hash, expires_at) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(uuidv7())
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

/// Look up a non-expired reset row by token digest.
pub async fn find_by_hash(
    pool: &PgPool,
    token_hash: &str,
) -> Result<Option<ResetTokenRecord>, AuthError> {
    let row = sqlx::query_as::<_, (Uuid, i64, String, DateTime<Utc>)>(
        "SELECT id, user_id, token_hash, expires_at \
         FROM password_reset_tokens \
         WHERE token_hash = $1 AND expires_at > now()",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(id, user_id, token_hash, expires_at)| ResetTokenRecord {
        id,
        user_id,
        token_hash,
        expires_at,
    }))
}

/// Delete every reset row for a user.
pub async fn delete_all_for_user(pool: &PgPool, user_id: i64) -> Result<(), AuthError> {
    sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
