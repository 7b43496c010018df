//! Authentication service — registration, login, and refresh rotation.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::{info, warn};

use jobtrail_core::auth::token::{self, REFRESH_TOKEN_TTL_DAYS};
use jobtrail_core::auth::{AuthError, password, queries, refresh_ledger};
use jobtrail_core::models::auth::{TokenKind, UserRecord};

use crate::error::{AppError, AppResult};
use crate::models::{AuthUser, RefreshResponse, TokenResponse};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Issue an access/refresh pair for a user and persist the refresh token's
/// hash in the ledger.
pub async fn issue_session(
    pool: &PgPool,
    user_id: i64,
    jwt_secret: &[u8],
) -> AppResult<(String, String)> {
    let access_token = token::issue_access(user_id, jwt_secret)?;
    let refresh_token = token::issue_refresh(user_id, jwt_secret)?;
    let token_hash = refresh_ledger::hash_token(&refresh_token)?;
    let expires_at = Utc::now() + Duration::days(REFRESH_TOKEN_TTL_DAYS);
    refresh_ledger::store(pool, user_id, &token_hash, expires_at).await?;
    Ok((access_token, refresh_token))
}

fn build_token_response(
    user: &UserRecord,
    access_token: String,
    refresh_token: String,
) -> TokenResponse {
    TokenResponse {
        user: AuthUser {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        },
        access_token,
        refresh_token,
    }
}

/// Register a new user account.
pub async fn register(
    pool: &PgPool,
    email: &str,
    password_plain: &str,
    name: Option<&str>,
    jwt_secret: &[u8],
) -> AppResult<TokenResponse> {
    if password_plain.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if queries::email_exists(pool, email).await? {
        return Err(AuthError::EmailAlreadyRegistered.into());
    }

    let pw_hash = password::hash_password(password_plain)?;
    let user_id = queries::create_user(pool, email, name, Some(&pw_hash)).await?;
    let user = queries::find_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::Internal("registered user vanished".into()))?;

    info!(user_id, "user registered");

    let (access_token, refresh_token) = issue_session(pool, user_id, jwt_secret).await?;
    Ok(build_token_response(&user, access_token, refresh_token))
}

/// Authenticate with email + password.
///
/// OAuth-only accounts (no password hash) fail exactly like a wrong
/// password, so the response does not reveal how the account was created.
pub async fn login(
    pool: &PgPool,
    email: &str,
    password_plain: &str,
    jwt_secret: &[u8],
) -> AppResult<TokenResponse> {
    let user = match queries::find_by_email(pool, email).await? {
        None => return Err(AuthError::InvalidCredentials.into()),
        Some(u) => u,
    };

    let pw_hash = match &user.password_hash {
        None => return Err(AuthError::AccountHasNoPassword.into()),
        Some(h) => h.clone(),
    };

    if !password::verify_password(password_plain, &pw_hash) {
        return Err(AuthError::InvalidCredentials.into());
    }

    let (access_token, refresh_token) = issue_session(pool, user.id, jwt_secret).await?;
    Ok(build_token_response(&user, access_token, refresh_token))
}

/// Exchange a refresh token for a new pair (single-use rotation).
///
/// The matched ledger row is deleted *before* the new pair is issued: a
/// failure between the two steps degrades to "log in again", never to the
/// old and new tokens both being valid.
pub async fn refresh(
    pool: &PgPool,
    refresh_token: &str,
    jwt_secret: &[u8],
) -> AppResult<RefreshResponse> {
    let claims = token::verify(refresh_token, TokenKind::Refresh, jwt_secret)
        .map_err(|_| AuthError::InvalidOrExpiredToken)?;

    let candidates = refresh_ledger::find_active(pool, claims.sub).await?;
    let matched = match refresh_ledger::find_matching(&candidates, refresh_token) {
        None => {
            // Already consumed, revoked, or never ours — indistinguishable
            // from an expired token on purpose.
            warn!(user_id = claims.sub, "refresh token matched no active ledger entry");
            return Err(AuthError::InvalidOrExpiredToken.into());
        }
        Some(m) => m.id,
    };

    refresh_ledger::delete_by_id(pool, matched).await?;

    let user = queries::find_by_id(pool, claims.sub)
        .await?
        .ok_or(AuthError::InvalidOrExpiredToken)?;

    let (access_token, new_refresh) = issue_session(pool, user.id, jwt_secret).await?;

    info!(user_id = user.id, "refresh token rotated");

    Ok(RefreshResponse {
        access_token,
        refresh_token: new_refresh,
    })
}

/// Revoke the ledger entry matching a refresh token.
///
/// Best-effort by design: a malformed or already-consumed token still lets
/// logout report success, so the caller can always clear local state.
pub async fn logout(pool: &PgPool, refresh_token: Option<&str>, jwt_secret: &[u8]) {
    let Some(presented) = refresh_token else {
        return;
    };
    let Ok(claims) = token::verify(presented, TokenKind::Refresh, jwt_secret) else {
        return;
    };
    let Ok(candidates) = refresh_ledger::find_active(pool, claims.sub).await else {
        return;
    };
    if let Some(matched) = refresh_ledger::find_matching(&candidates, presented) {
        if refresh_ledger::delete_by_id(pool, matched.id).await.is_ok() {
            info!(user_id = claims.sub, "session revoked on logout");
        }
    }
}
