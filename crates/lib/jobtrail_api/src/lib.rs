//! # jobtrail_api
//!
//! HTTP API library for Jobtrail.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use jobtrail_core::mailer::Mailer;

use crate::config::ApiConfig;
use crate::handlers::{account, auth, health, oauth};
use crate::services::oauth::OAuthStateStore;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool.
    pub pool: PgPool,
    /// API configuration.
    pub config: ApiConfig,
    /// Outbound HTTP client (provider token/profile calls).
    pub http: reqwest::Client,
    /// Pending OAuth authorization state.
    pub oauth_state: Arc<OAuthStateStore>,
    /// Outbound email capability.
    pub mailer: Arc<dyn Mailer>,
}

/// Run embedded database migrations.
///
/// Delegates to `jobtrail_core::migrate::migrate()` which owns the
/// migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    jobtrail_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/healthz", get(health::healthz_handler))
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/forgot-password", post(auth::forgot_password_handler))
        .route("/auth/reset-password", post(auth::reset_password_handler))
        .route("/auth/{provider}", get(oauth::oauth_authorize_handler))
        .route(
            "/auth/{provider}/callback",
            get(oauth::oauth_callback_handler),
        );

    // Protected routes (require an access token)
    let protected = Router::new()
        .route("/auth/me", get(account::me_handler))
        .route("/auth/password", put(account::change_password_handler))
        .route(
            "/auth/account",
            put(account::update_account_handler).delete(account::delete_account_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
