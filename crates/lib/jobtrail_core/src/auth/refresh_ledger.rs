//! Refresh token ledger.
//!
//! Persists a salted one-way digest of every outstanding refresh token,
//! keyed by the owning user. Rows are inserted on issuance and deleted on
//! consumption, logout, or password reset — never updated in place, so a
//! given row can be consumed by at most one rotation.
//!
//! The digest is bcrypt over a SHA-256 pre-hash of the bearer token. The
//! pre-hash keeps the input inside bcrypt's 72-byte limit (signed tokens are
//! longer than that); the bcrypt layer keeps the stored value salted and
//! non-deterministic. Because the digest is salted, lookups go by user id
//! and the caller compares the presented token against every active
//! candidate.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use super::{AuthError, password};
use crate::models::auth::RefreshTokenRecord;
use crate::uuid::uuidv7;

/// SHA-256 pre-hash of a refresh token, hex encoded.
fn digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Produce the salted storage hash for a refresh token.
pub fn hash_token(token: &str) -> Result<String, AuthError> {
    password::hash_password(&digest(token))
}

/// Compare a presented refresh token against a stored hash.
pub fn token_matches(token: &str, stored_hash: &str) -> bool {
    password::verify_password(&digest(token), stored_hash)
}

/// Scan active candidates in arrival order for the entry matching the
/// presented token. Stops at the first match.
pub fn find_matching<'a>(
    candidates: &'a [RefreshTokenRecord],
    token: &str,
) -> Option<&'a RefreshTokenRecord> {
    candidates.iter().find(|c| token_matches(token, &c.token_hash))
}

/// Insert a new ledger row.
pub async fn store(
    pool: &PgPool,
    user_id: i64,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), AuthError> {
    sqlx::query(
        "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(uuidv7())
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fetch all non-expired ledger rows for a user, oldest first.
pub async fn find_active(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<RefreshTokenRecord>, AuthError> {
    let rows = sqlx::query_as::<_, (Uuid, i64, String, DateTime<Utc>)>(
        "SELECT id, user_id, token_hash, expires_at \
         FROM refresh_tokens \
         WHERE user_id = $1 AND expires_at > now() \
         ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, user_id, token_hash, expires_at)| RefreshTokenRecord {
            id,
            user_id,
            token_hash,
            expires_at,
        })
        .collect())
}

/// Delete one ledger row. Consuming a row this way is what makes a refresh
/// token single-use.
pub async fn delete_by_id(pool: &PgPool, id: Uuid) -> Result<(), AuthError> {
    sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete every ledger row for a user, forcing re-authentication on all
/// devices.
pub async fn delete_all_for_user(pool: &PgPool, user_id: i64) -> Result<(), AuthError> {
    sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete expired ledger rows across all users.
pub async fn delete_expired(pool: &PgPool) -> Result<u64, AuthError> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= now()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
