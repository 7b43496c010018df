//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{
    ForgotPasswordRequest, LoginRequest, LogoutRequest, MessageResponse, RefreshRequest,
    RefreshResponse, RegisterRequest, ResetPasswordRequest, TokenResponse,
};
use crate::services::{auth, reset};

/// `POST /auth/register` — create a new user account.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<TokenResponse>)> {
    let resp = auth::register(
        &state.pool,
        &body.email,
        &body.password,
        body.name.as_deref(),
        state.config.jwt_secret.as_bytes(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// `POST /auth/login` — authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let resp = auth::login(
        &state.pool,
        &body.email,
        &body.password,
        state.config.jwt_secret.as_bytes(),
    )
    .await?;
    Ok(Json(resp))
}

/// `POST /auth/refresh` — exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<RefreshResponse>> {
    let resp = auth::refresh(
        &state.pool,
        &body.refresh_token,
        state.config.jwt_secret.as_bytes(),
    )
    .await?;
    Ok(Json(resp))
}

/// `POST /auth/logout` — revoke a refresh token. Never fails the caller.
pub async fn logout_handler(
    State(state): State<AppState>,
    Json(body): Json<LogoutRequest>,
) -> Json<MessageResponse> {
    auth::logout(
        &state.pool,
        body.refresh_token.as_deref(),
        state.config.jwt_secret.as_bytes(),
    )
    .await;
    Json(MessageResponse {
        message: "Logged out".into(),
    })
}

/// `POST /auth/forgot-password` — start a password reset.
///
/// The response body is identical whether or not the email exists.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    reset::request_reset(
        &state.pool,
        state.mailer.as_ref(),
        &state.config.frontend_url,
        &body.email,
    )
    .await?;
    Ok(Json(MessageResponse {
        message: reset::RESET_REQUESTED_MESSAGE.into(),
    }))
}

/// `POST /auth/reset-password` — consume a reset token and set a new password.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    reset::consume_reset(&state.pool, &body.token, &body.new_password).await?;
    Ok(Json(MessageResponse {
        message: reset::RESET_DONE_MESSAGE.into(),
    }))
}
