//! OAuth request handlers.
//!
//! Both legs answer with redirects: the authorize leg sends the browser to
//! the provider, the callback leg sends it back to the frontend — with a
//! token pair in the query string on success, or an error code on failure.

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use jobtrail_core::models::auth::OAuthProvider;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::services::oauth::{self, CALLBACK_ERROR_CODE, CallbackError, CallbackParams};

/// Build a 302 redirect.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn parse_provider(provider: &str) -> AppResult<OAuthProvider> {
    provider
        .parse()
        .map_err(|_| AppError::NotFound(format!("Unknown provider '{provider}'")))
}

/// `GET /auth/{provider}` — redirect to the provider's authorize URL.
pub async fn oauth_authorize_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> AppResult<Response> {
    let provider = parse_provider(&provider)?;
    let url = oauth::begin_authorization(&state, provider)?;
    Ok(found(&url))
}

/// `GET /auth/{provider}/callback` — complete the flow and hand tokens to
/// the frontend. Failures redirect with an error code instead of erroring.
pub async fn oauth_callback_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> AppResult<Response> {
    let provider = parse_provider(&provider)?;
    let frontend = &state.config.frontend_url;
    match oauth::complete_authorization(&state, provider, params).await {
        Ok((access_token, refresh_token)) => Ok(found(&format!(
            "{frontend}/auth/callback?access_token={access_token}&refresh_token={refresh_token}"
        ))),
        Err(CallbackError::Unconfigured(e)) => Err(e),
        Err(CallbackError::Failed) => Ok(found(&format!(
            "{frontend}/login?error={CALLBACK_ERROR_CODE}"
        ))),
    }
}
