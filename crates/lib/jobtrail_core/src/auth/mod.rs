//! Authentication and session-lifecycle logic.
//!
//! Provides password hashing, token issuance and verification, the refresh
//! and password-reset token ledgers, and the user queries shared by
//! `jobtrail_api`.

pub mod password;
pub mod queries;
pub mod refresh_ledger;
pub mod reset_ledger;
pub mod token;

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Email is already registered")]
    EmailAlreadyRegistered,

    #[error("Account has no password")]
    AccountHasNoPassword,

    #[error("Invalid or expired reset token")]
    InvalidOrExpiredReset,

    #[error("User not found")]
    UserNotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
