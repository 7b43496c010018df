//! Account service — profile, password change, profile update, deletion.

use sqlx::PgPool;
use tracing::info;

use jobtrail_core::auth::{AuthError, password, queries};
use jobtrail_core::models::auth::UserRecord;

use crate::error::{AppError, AppResult};
use crate::models::MeResponse;
use crate::services::auth::MIN_PASSWORD_LEN;

fn me_response(user: &UserRecord) -> MeResponse {
    MeResponse {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        has_password: user.password_hash.is_some(),
        google_connected: user.google_id.is_some(),
        github_connected: user.github_id.is_some(),
    }
}

/// Fetch the authenticated user's profile with derived flags.
pub async fn profile(pool: &PgPool, user_id: i64) -> AppResult<MeResponse> {
    let user = queries::find_by_id(pool, user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    Ok(me_response(&user))
}

/// Change the authenticated user's password.
///
/// Accounts that already hold a password must present the current one.
/// OAuth-only accounts may set their first password without it.
pub async fn change_password(
    pool: &PgPool,
    user_id: i64,
    current_password: Option<&str>,
    new_password: &str,
) -> AppResult<()> {
    if new_password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let user = queries::find_by_id(pool, user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    if let Some(existing_hash) = &user.password_hash {
        let Some(current) = current_password else {
            return Err(AppError::Validation("Current password is required".into()));
        };
        if !password::verify_password(current, existing_hash) {
            return Err(AuthError::InvalidCredentials.into());
        }
    }

    let pw_hash = password::hash_password(new_password)?;
    queries::update_password(pool, user_id, &pw_hash).await?;

    info!(user_id, "password changed");
    Ok(())
}

/// Update profile fields, enforcing email uniqueness.
pub async fn update_account(
    pool: &PgPool,
    user_id: i64,
    name: Option<&str>,
    email: Option<&str>,
) -> AppResult<MeResponse> {
    if let Some(new_email) = email {
        let taken = queries::find_by_email(pool, new_email)
            .await?
            .is_some_and(|u| u.id != user_id);
        if taken {
            return Err(AuthError::EmailAlreadyRegistered.into());
        }
    }

    let user = queries::update_profile(pool, user_id, name, email)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    Ok(me_response(&user))
}

/// Delete the account. Ledger rows cascade with the user row, so every
/// outstanding token dies with the account.
pub async fn delete_account(pool: &PgPool, user_id: i64) -> AppResult<()> {
    if !queries::delete_user(pool, user_id).await? {
        return Err(AuthError::UserNotFound.into());
    }
    info!(user_id, "account deleted");
    Ok(())
}
