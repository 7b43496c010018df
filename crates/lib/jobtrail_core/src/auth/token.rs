//! Signed token issuance and verification.
//!
//! Access and refresh tokens are HS256 JWTs carrying `{sub, kind, iat, exp}`.
//! Verification is purely functional given the signing secret and the clock;
//! no state is consulted here. Ledger checks are the caller's concern.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use rand::distr::Alphanumeric;
use thiserror::Error;
use tracing::info;

use crate::models::auth::{TokenClaims, TokenKind};

/// Access token lifetime: 15 minutes.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 30 days.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 30;

/// Why a token failed verification.
///
/// Malformed, unsigned, and expired tokens all collapse into [`Invalid`] so
/// the caller cannot distinguish them; a token of the wrong kind is reported
/// separately so an access token can never stand in for a refresh token.
///
/// [`Invalid`]: TokenVerifyError::Invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenVerifyError {
    #[error("invalid or expired token")]
    Invalid,

    #[error("wrong token kind")]
    WrongKind,
}

/// Issue a signed access token for a user.
pub fn issue_access(user_id: i64, secret: &[u8]) -> Result<String, super::AuthError> {
    issue(user_id, TokenKind::Access, Duration::seconds(ACCESS_TOKEN_TTL_SECS), secret)
}

/// Issue a signed refresh token for a user.
pub fn issue_refresh(user_id: i64, secret: &[u8]) -> Result<String, super::AuthError> {
    issue(user_id, TokenKind::Refresh, Duration::days(REFRESH_TOKEN_TTL_DAYS), secret)
}

fn issue(
    user_id: i64,
    kind: TokenKind,
    ttl: Duration,
    secret: &[u8],
) -> Result<String, super::AuthError> {
    let now = Utc::now();
    let claims = TokenClaims {
        sub: user_id,
        kind,
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| super::AuthError::Internal(format!("jwt encode: {e}")))
}

/// Verify a token and check it is of the expected kind.
pub fn verify(
    token: &str,
    expected: TokenKind,
    secret: &[u8],
) -> Result<TokenClaims, TokenVerifyError> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::default();
    validation.validate_exp = true;
    let claims = decode::<TokenClaims>(token, &key, &validation)
        .map_err(|_| TokenVerifyError::Invalid)?
        .claims;
    if claims.kind != expected {
        return Err(TokenVerifyError::WrongKind);
    }
    Ok(claims)
}

/// Resolve the JWT secret: env var `JWT_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    // Generate and persist
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jobtrail")
        .join("jwt-secret")
}
