//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::InvalidResetToken => (
                StatusCode::BAD_REQUEST,
                "invalid_reset_token",
                "Invalid or expired reset token",
            ),
            AppError::NotImplemented(m) => {
                (StatusCode::NOT_IMPLEMENTED, "not_implemented", m.as_str())
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".into()),
            _ => AppError::Internal(e.to_string()),
        }
    }
}

impl From<jobtrail_core::auth::AuthError> for AppError {
    fn from(e: jobtrail_core::auth::AuthError) -> Self {
        use jobtrail_core::auth::AuthError;
        match e {
            AuthError::InvalidCredentials => AppError::Unauthorized("Invalid credentials".into()),
            AuthError::InvalidOrExpiredToken => {
                AppError::Unauthorized("Invalid or expired token".into())
            }
            AuthError::EmailAlreadyRegistered => {
                AppError::Conflict("Email is already registered".into())
            }
            // Externally indistinguishable from bad credentials: the login
            // surface must not reveal how an account was created.
            AuthError::AccountHasNoPassword => {
                AppError::Unauthorized("Invalid credentials".into())
            }
            AuthError::InvalidOrExpiredReset => AppError::InvalidResetToken,
            AuthError::UserNotFound => AppError::NotFound("User not found".into()),
            AuthError::Validation(m) => AppError::Validation(m),
            AuthError::Db(e) => AppError::from(e),
            AuthError::Internal(m) => AppError::Internal(m),
        }
    }
}
