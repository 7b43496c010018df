//! Password-reset service.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::{error, info};

use jobtrail_core::auth::reset_ledger::{self, RESET_TOKEN_TTL_SECS};
use jobtrail_core::auth::{AuthError, password, queries, refresh_ledger};
use jobtrail_core::mailer::Mailer;

use crate::error::{AppError, AppResult};
use crate::services::auth::MIN_PASSWORD_LEN;

/// The one response body `forgot-password` ever produces. Unknown emails and
/// OAuth-only accounts take a different branch internally but return this
/// exact string, so the endpoint cannot be used to probe for accounts.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If that email address is registered, a password reset link has been sent.";

/// Confirmation body for a consumed reset token.
pub const RESET_DONE_MESSAGE: &str = "Your password has been reset. Please log in again.";

fn reset_email_body(reset_url: &str) -> String {
    format!(
        "We received a request to reset your Jobtrail password.\n\n\
         Open the link below to choose a new one. The link expires in one hour.\n\n\
         {reset_url}\n\n\
         If you did not request this, you can ignore this email."
    )
}

/// Start a password reset for the given email.
///
/// Every branch — unknown email, OAuth-only account, delivery failure —
/// resolves to the same generic success; only the real path has side
/// effects.
pub async fn request_reset(
    pool: &PgPool,
    mailer: &dyn Mailer,
    frontend_url: &str,
    email: &str,
) -> AppResult<()> {
    let Some(user) = queries::find_by_email(pool, email).await? else {
        info!("password reset requested for unknown email");
        return Ok(());
    };
    if user.password_hash.is_none() {
        info!(user_id = user.id, "password reset requested for account without password");
        return Ok(());
    }

    let token = reset_ledger::generate_token();
    let token_hash = reset_ledger::hash_token(&token);
    let expires_at = Utc::now() + Duration::seconds(RESET_TOKEN_TTL_SECS);
    reset_ledger::replace_for_user(pool, user.id, &token_hash, expires_at).await?;

    let reset_url = format!("{frontend_url}/reset-password?token={token}");
    if let Err(e) = mailer
        .send_email(&user.email, "Reset your Jobtrail password", &reset_email_body(&reset_url))
        .await
    {
        // Surfacing this would reveal that the email exists.
        error!(user_id = user.id, error = %e, "failed to send reset email");
        return Ok(());
    }

    info!(user_id = user.id, "password reset email sent");
    Ok(())
}

/// Consume a reset token and set a new password.
///
/// A successful reset is a security event: every outstanding refresh token
/// for the user is removed, logging the account out on all devices.
pub async fn consume_reset(pool: &PgPool, token: &str, new_password: &str) -> AppResult<()> {
    if new_password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let token_hash = reset_ledger::hash_token(token);
    let entry = reset_ledger::find_by_hash(pool, &token_hash)
        .await?
        .ok_or(AuthError::InvalidOrExpiredReset)?;

    let pw_hash = password::hash_password(new_password)?;
    queries::update_password(pool, entry.user_id, &pw_hash).await?;

    reset_ledger::delete_all_for_user(pool, entry.user_id).await?;
    refresh_ledger::delete_all_for_user(pool, entry.user_id).await?;

    info!(user_id = entry.user_id, "password reset completed, all sessions revoked");
    Ok(())
}
