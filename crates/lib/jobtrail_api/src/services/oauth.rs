//! OAuth identity bridge — maps an external identity onto a local user and
//! issues the same token pair as password login.
//!
//! Providers: Google and GitHub. The authorize leg stores a CSRF state in an
//! in-process store; the callback leg validates it, exchanges the code,
//! fetches the profile, then finds-or-creates the local user. Every callback
//! failure is reported as a redirect carrying an error code — nothing past
//! the handler boundary surfaces as a 5xx.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use url::Url;

use jobtrail_core::auth::{AuthError, queries};
use jobtrail_core::models::auth::{OAuthProvider, UserRecord};

use crate::AppState;
use crate::config::OAuthProviderSettings;
use crate::error::{AppError, AppResult};
use crate::services::auth::issue_session;

/// TTL for pending authorization state (10 minutes).
const STATE_TTL: Duration = Duration::from_secs(600);

/// Error code placed in the redirect query string when a callback fails.
pub const CALLBACK_ERROR_CODE: &str = "oauth_failed";

// =============================================================================
// CSRF state store
// =============================================================================

/// Pending authorization stored between the authorize and callback legs.
struct PendingAuthorization {
    provider: OAuthProvider,
    created_at: Instant,
}

/// In-memory store for authorization state (keyed by the state parameter).
pub struct OAuthStateStore {
    states: DashMap<String, PendingAuthorization>,
}

impl OAuthStateStore {
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    fn insert(&self, state_key: String, provider: OAuthProvider) {
        self.states.insert(
            state_key,
            PendingAuthorization {
                provider,
                created_at: Instant::now(),
            },
        );
    }

    /// Take (remove and return) a pending entry.
    /// Returns `None` if unknown, expired, or for a different provider.
    fn take(&self, state_key: &str, provider: OAuthProvider) -> Option<()> {
        let (_, pending) = self.states.remove(state_key)?;
        if pending.created_at.elapsed() > STATE_TTL || pending.provider != provider {
            return None;
        }
        Some(())
    }

    /// Evict expired entries.
    pub fn cleanup(&self) {
        self.states
            .retain(|_, v| v.created_at.elapsed() <= STATE_TTL);
    }

    /// Spawn a periodic cleanup task.
    pub fn spawn_cleanup_task(self: &std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                store.cleanup();
            }
        })
    }
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a cryptographic state parameter (CSRF token).
fn generate_state() -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

// =============================================================================
// Authorize leg
// =============================================================================

fn provider_settings(
    state: &AppState,
    provider: OAuthProvider,
) -> AppResult<OAuthProviderSettings> {
    let settings = match provider {
        OAuthProvider::Google => state.config.google.clone(),
        OAuthProvider::Github => state.config.github.clone(),
    };
    settings.ok_or_else(|| {
        AppError::NotImplemented(format!("{provider} login is not configured"))
    })
}

fn redirect_uri(state: &AppState, provider: OAuthProvider) -> String {
    format!("{}/auth/{provider}/callback", state.config.public_url)
}

/// Build the provider authorize URL and remember the CSRF state.
///
/// An unconfigured provider fails deterministically here — no network call
/// is ever attempted.
pub fn begin_authorization(state: &AppState, provider: OAuthProvider) -> AppResult<String> {
    let settings = provider_settings(state, provider)?;
    let csrf_state = generate_state();
    state.oauth_state.insert(csrf_state.clone(), provider);

    let redirect = redirect_uri(state, provider);
    let url = match provider {
        OAuthProvider::Google => Url::parse_with_params(
            "https://accounts.google.com/o/oauth2/v2/auth",
            &[
                ("client_id", settings.client_id.as_str()),
                ("redirect_uri", redirect.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", csrf_state.as_str()),
            ],
        ),
        OAuthProvider::Github => Url::parse_with_params(
            "https://github.com/login/oauth/authorize",
            &[
                ("client_id", settings.client_id.as_str()),
                ("redirect_uri", redirect.as_str()),
                ("scope", "read:user user:email"),
                ("state", csrf_state.as_str()),
            ],
        ),
    }
    .map_err(|e| AppError::Internal(format!("authorize url: {e}")))?;

    debug!(%provider, "authorization started");
    Ok(url.into())
}

// =============================================================================
// Callback leg
// =============================================================================

/// Query parameters delivered to the callback endpoint.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// How a callback can fail.
///
/// `Unconfigured` maps to a fixed 501; everything else becomes a redirect
/// back to the login surface with [`CALLBACK_ERROR_CODE`].
pub enum CallbackError {
    Unconfigured(AppError),
    Failed,
}

/// External profile fields needed to resolve a local user.
struct ExternalIdentity {
    provider_user_id: String,
    email: String,
    name: Option<String>,
}

/// Validate state, exchange the code, resolve the user, and issue a token
/// pair. Returns `(access_token, refresh_token)`.
pub async fn complete_authorization(
    state: &AppState,
    provider: OAuthProvider,
    params: CallbackParams,
) -> Result<(String, String), CallbackError> {
    let settings = provider_settings(state, provider).map_err(CallbackError::Unconfigured)?;

    if let Some(error) = &params.error {
        warn!(%provider, error, "provider returned an authorization error");
        return Err(CallbackError::Failed);
    }
    let (Some(code), Some(csrf_state)) = (&params.code, &params.state) else {
        warn!(%provider, "callback missing code or state");
        return Err(CallbackError::Failed);
    };
    if state.oauth_state.take(csrf_state, provider).is_none() {
        warn!(%provider, "callback state unknown or expired");
        return Err(CallbackError::Failed);
    }

    let redirect = redirect_uri(state, provider);
    let identity = match fetch_identity(&state.http, provider, &settings, code, &redirect).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!(%provider, error = %e, "identity fetch failed");
            return Err(CallbackError::Failed);
        }
    };

    let user = match resolve_external_identity(&state.pool, provider, &identity).await {
        Ok(user) => user,
        Err(e) => {
            warn!(%provider, error = %e, "identity resolution failed");
            return Err(CallbackError::Failed);
        }
    };

    match issue_session(&state.pool, user.id, state.config.jwt_secret.as_bytes()).await {
        Ok(pair) => {
            info!(user_id = user.id, %provider, "external identity logged in");
            Ok(pair)
        }
        Err(e) => {
            warn!(%provider, error = %e, "session issuance failed after identity resolution");
            Err(CallbackError::Failed)
        }
    }
}

/// Find-or-create the local user for an external identity.
///
/// Resolution order: linked provider id, then email (linking the provider to
/// the existing account), then a fresh password-less account.
async fn resolve_external_identity(
    pool: &PgPool,
    provider: OAuthProvider,
    identity: &ExternalIdentity,
) -> Result<UserRecord, AuthError> {
    if let Some(user) =
        queries::find_by_provider_id(pool, provider, &identity.provider_user_id).await?
    {
        return Ok(user);
    }

    if let Some(user) = queries::find_by_email(pool, &identity.email).await? {
        queries::link_provider(pool, user.id, provider, &identity.provider_user_id).await?;
        info!(user_id = user.id, %provider, "linked provider to existing account");
        return queries::find_by_id(pool, user.id)
            .await?
            .ok_or(AuthError::UserNotFound);
    }

    let user_id =
        queries::create_user(pool, &identity.email, identity.name.as_deref(), None).await?;
    queries::link_provider(pool, user_id, provider, &identity.provider_user_id).await?;
    info!(user_id, %provider, "created account from external identity");
    queries::find_by_id(pool, user_id)
        .await?
        .ok_or(AuthError::UserNotFound)
}

// =============================================================================
// Provider HTTP calls
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleProfile {
    id: String,
    email: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubProfile {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

async fn fetch_identity(
    http: &reqwest::Client,
    provider: OAuthProvider,
    settings: &OAuthProviderSettings,
    code: &str,
    redirect_uri: &str,
) -> Result<ExternalIdentity, AppError> {
    let access_token = exchange_code(http, provider, settings, code, redirect_uri).await?;
    match provider {
        OAuthProvider::Google => fetch_google_profile(http, &access_token).await,
        OAuthProvider::Github => fetch_github_profile(http, &access_token).await,
    }
}

async fn exchange_code(
    http: &reqwest::Client,
    provider: OAuthProvider,
    settings: &OAuthProviderSettings,
    code: &str,
    redirect_uri: &str,
) -> Result<String, AppError> {
    let token_url = match provider {
        OAuthProvider::Google => "https://oauth2.googleapis.com/token",
        OAuthProvider::Github => "https://github.com/login/oauth/access_token",
    };
    let mut form = vec![
        ("code", code),
        ("client_id", settings.client_id.as_str()),
        ("client_secret", settings.client_secret.as_str()),
        ("redirect_uri", redirect_uri),
    ];
    if provider == OAuthProvider::Google {
        form.push(("grant_type", "authorization_code"));
    }

    let response = http
        .post(token_url)
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&form)
        .send()
        .await
        .map_err(|e| AppError::Internal(format!("token exchange request: {e}")))?;
    if !response.status().is_success() {
        return Err(AppError::Internal(format!(
            "token exchange returned {}",
            response.status()
        )));
    }
    let body: TokenExchangeResponse = response
        .json()
        .await
        .map_err(|e| AppError::Internal(format!("token exchange body: {e}")))?;
    body.access_token
        .ok_or_else(|| AppError::Internal("token exchange returned no access token".into()))
}

async fn fetch_google_profile(
    http: &reqwest::Client,
    access_token: &str,
) -> Result<ExternalIdentity, AppError> {
    let profile: GoogleProfile = http
        .get("https://www.googleapis.com/oauth2/v2/userinfo")
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| AppError::Internal(format!("userinfo request: {e}")))?
        .json()
        .await
        .map_err(|e| AppError::Internal(format!("userinfo body: {e}")))?;

    let email = profile
        .email
        .ok_or_else(|| AppError::Internal("google profile has no email".into()))?;
    Ok(ExternalIdentity {
        provider_user_id: profile.id,
        email,
        name: profile.name,
    })
}

async fn fetch_github_profile(
    http: &reqwest::Client,
    access_token: &str,
) -> Result<ExternalIdentity, AppError> {
    let profile: GithubProfile = http
        .get("https://api.github.com/user")
        .bearer_auth(access_token)
        .header(reqwest::header::USER_AGENT, "jobtrail")
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .send()
        .await
        .map_err(|e| AppError::Internal(format!("profile request: {e}")))?
        .json()
        .await
        .map_err(|e| AppError::Internal(format!("profile body: {e}")))?;

    let email = match profile.email {
        Some(email) => email,
        // Profile email can be hidden; fall back to the primary verified one.
        None => {
            let emails: Vec<GithubEmail> = http
                .get("https://api.github.com/user/emails")
                .bearer_auth(access_token)
                .header(reqwest::header::USER_AGENT, "jobtrail")
                .header(reqwest::header::ACCEPT, "application/vnd.github+json")
                .send()
                .await
                .map_err(|e| AppError::Internal(format!("emails request: {e}")))?
                .json()
                .await
                .map_err(|e| AppError::Internal(format!("emails body: {e}")))?;
            emails
                .into_iter()
                .find(|e| e.primary && e.verified)
                .map(|e| e.email)
                .ok_or_else(|| {
                    AppError::Internal("github account has no verified primary email".into())
                })?
        }
    };

    Ok(ExternalIdentity {
        provider_user_id: profile.id.to_string(),
        email,
        name: profile.name.or(Some(profile.login)),
    })
}
