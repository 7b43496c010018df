//! User-related database queries.

use sqlx::PgPool;

use super::AuthError;
use crate::models::auth::{OAuthProvider, UserRecord};

type UserRow = (
    i64,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

const USER_COLUMNS: &str = "id, email, name, password_hash, google_id, github_id";

fn into_record(row: UserRow) -> UserRecord {
    UserRecord {
        id: row.0,
        email: row.1,
        name: row.2,
        password_hash: row.3,
        google_id: row.4,
        github_id: row.5,
    }
}

/// Fetch a user by email.
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRecord>, AuthError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(into_record))
}

/// Fetch a user by id.
pub async fn find_by_id(pool: &PgPool, user_id: i64) -> Result<Option<UserRecord>, AuthError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(into_record))
}

/// Fetch a user by linked provider identity.
pub async fn find_by_provider_id(
    pool: &PgPool,
    provider: OAuthProvider,
    provider_user_id: &str,
) -> Result<Option<UserRecord>, AuthError> {
    let column = provider_column(provider);
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE {column} = $1"
    ))
    .bind(provider_user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(into_record))
}

/// Check whether an email is already registered.
pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool, AuthError> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

/// Create a new user, returning the user id.
///
/// `password_hash` is `None` for OAuth-only accounts.
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    name: Option<&str>,
    password_hash: Option<&str>,
) -> Result<i64, AuthError> {
    let user_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (email, name, password_hash) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(email)
    .bind(name)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;
    Ok(user_id)
}

/// Set (or clear) a user's password hash.
pub async fn update_password(
    pool: &PgPool,
    user_id: i64,
    password_hash: &str,
) -> Result<(), AuthError> {
    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .await?;
    Ok(())
}

/// Update a user's profile fields, returning the fresh row.
pub async fn update_profile(
    pool: &PgPool,
    user_id: i64,
    name: Option<&str>,
    email: Option<&str>,
) -> Result<Option<UserRecord>, AuthError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users \
         SET name = COALESCE($2, name), email = COALESCE($3, email) \
         WHERE id = $1 \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(name)
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(into_record))
}

/// Link a provider identity to an existing user.
pub async fn link_provider(
    pool: &PgPool,
    user_id: i64,
    provider: OAuthProvider,
    provider_user_id: &str,
) -> Result<(), AuthError> {
    let column = provider_column(provider);
    sqlx::query(&format!("UPDATE users SET {column} = $2 WHERE id = $1"))
        .bind(user_id)
        .bind(provider_user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a user. Ledger rows cascade at the storage layer.
///
/// Returns `false` when no such user existed.
pub async fn delete_user(pool: &PgPool, user_id: i64) -> Result<bool, AuthError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn provider_column(provider: OAuthProvider) -> &'static str {
    match provider {
        OAuthProvider::Google => "google_id",
        OAuthProvider::Github => "github_id",
    }
}
