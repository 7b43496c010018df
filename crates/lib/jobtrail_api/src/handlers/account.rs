//! Account request handlers (authenticated).

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{ChangePasswordRequest, MeResponse, MessageResponse, UpdateAccountRequest};
use crate::services::account;

/// `GET /auth/me` — profile with derived account flags.
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<MeResponse>> {
    let resp = account::profile(&state.pool, user.user_id()).await?;
    Ok(Json(resp))
}

/// `PUT /auth/password` — change the current user's password.
pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    account::change_password(
        &state.pool,
        user.user_id(),
        body.current_password.as_deref(),
        &body.new_password,
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "Password updated".into(),
    }))
}

/// `PUT /auth/account` — update profile fields.
pub async fn update_account_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<UpdateAccountRequest>,
) -> AppResult<Json<MeResponse>> {
    let resp = account::update_account(
        &state.pool,
        user.user_id(),
        body.name.as_deref(),
        body.email.as_deref(),
    )
    .await?;
    Ok(Json(resp))
}

/// `DELETE /auth/account` — delete the current user and every token with it.
pub async fn delete_account_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<StatusCode> {
    account::delete_account(&state.pool, user.user_id()).await?;
    Ok(StatusCode::NO_CONTENT)
}
