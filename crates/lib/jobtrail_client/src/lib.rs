//! # jobtrail_client
//!
//! Typed HTTP client for the Jobtrail API.
//!
//! Every request goes through the session layer: the held access token is
//! attached on the way out, and an authentication failure on the way back
//! triggers a single coalesced rotation call before the request is replayed
//! once with the fresh credential. When renewal
//! fails, local credentials are cleared and callers receive
//! [`ClientError::SessionExpired`] — the cue to send the user back to the
//! login surface.

mod coordinator;
pub mod error;

pub use error::{ClientError, Result};

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::coordinator::{RenewalCoordinator, RenewalError};

/// Endpoints that must never trigger a renewal cycle: they are either
/// unauthenticated or part of the renewal machinery itself.
const RENEWAL_EXEMPT_PATHS: &[&str] = &[
    "/auth/register",
    "/auth/login",
    "/auth/refresh",
    "/auth/logout",
    "/auth/forgot-password",
    "/auth/reset-password",
];

fn is_renewal_exempt(path: &str) -> bool {
    RENEWAL_EXEMPT_PATHS.contains(&path)
}

/// The held token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// User as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
}

/// Outcome of login/registration: the user plus the stored token pair.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub tokens: SessionTokens,
}

/// Profile with derived account flags (`GET /auth/me`).
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub has_password: bool,
    pub google_connected: bool,
    pub github_connected: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponseBody {
    user: User,
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponseBody {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
    message: String,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    session: RwLock<Option<SessionTokens>>,
    renewal: RenewalCoordinator,
}

/// Jobtrail API client. Cheap to clone; clones share session state and the
/// renewal coordinator.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Create a client for the API at `base_url` (e.g. `http://127.0.0.1:3400`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ClientError::InvalidBaseUrl(base_url));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                session: RwLock::new(None),
                renewal: RenewalCoordinator::new(),
            }),
        })
    }

    // -----------------------------------------------------------------------
    // Session state
    // -----------------------------------------------------------------------

    /// The currently held token pair, if any.
    pub async fn session(&self) -> Option<SessionTokens> {
        self.inner.session.read().await.clone()
    }

    /// Install a token pair (e.g. tokens carried back from an OAuth redirect).
    pub async fn set_session(&self, tokens: SessionTokens) {
        *self.inner.session.write().await = Some(tokens);
    }

    /// Drop credentials and any in-flight renewal handle.
    pub async fn clear_session(&self) {
        *self.inner.session.write().await = None;
        self.inner.renewal.flush().await;
    }

    async fn access_token(&self) -> Option<String> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    // -----------------------------------------------------------------------
    // Auth endpoints
    // -----------------------------------------------------------------------

    /// `POST /auth/register` — create an account and store its tokens.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<AuthSession> {
        let body = serde_json::json!({ "email": email, "password": password, "name": name });
        let resp = self
            .dispatch(Method::POST, "/auth/register", Some(&body), None)
            .await?;
        self.install_session(resp).await
    }

    /// `POST /auth/login` — authenticate and store the token pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let body = serde_json::json!({ "email": email, "password": password });
        let resp = self
            .dispatch(Method::POST, "/auth/login", Some(&body), None)
            .await?;
        self.install_session(resp).await
    }

    async fn install_session(&self, resp: reqwest::Response) -> Result<AuthSession> {
        let body: TokenResponseBody = Self::decode(resp).await?;
        let tokens = SessionTokens {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
        };
        self.set_session(tokens.clone()).await;
        Ok(AuthSession {
            user: body.user,
            tokens,
        })
    }

    /// `POST /auth/logout` — revoke the held refresh token.
    ///
    /// Local credentials are cleared before the network call, so the client
    /// ends up logged out even when the server is unreachable.
    pub async fn logout(&self) -> Result<()> {
        let refresh = self
            .inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone());
        self.clear_session().await;
        if let Some(refresh_token) = refresh {
            let body = serde_json::json!({ "refreshToken": refresh_token });
            let resp = self
                .dispatch(Method::POST, "/auth/logout", Some(&body), None)
                .await?;
            let _: MessageBody = Self::decode(resp).await?;
        }
        Ok(())
    }

    /// `POST /auth/forgot-password` — request a reset link.
    pub async fn forgot_password(&self, email: &str) -> Result<String> {
        let body = serde_json::json!({ "email": email });
        let resp = self
            .dispatch(Method::POST, "/auth/forgot-password", Some(&body), None)
            .await?;
        let body: MessageBody = Self::decode(resp).await?;
        Ok(body.message)
    }

    /// `POST /auth/reset-password` — consume a reset token.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<String> {
        let body = serde_json::json!({ "token": token, "newPassword": new_password });
        let resp = self
            .dispatch(Method::POST, "/auth/reset-password", Some(&body), None)
            .await?;
        let body: MessageBody = Self::decode(resp).await?;
        Ok(body.message)
    }

    /// `GET /auth/me` — the authenticated profile.
    pub async fn me(&self) -> Result<Profile> {
        self.get("/auth/me").await
    }

    // -----------------------------------------------------------------------
    // Generic authorized requests
    // -----------------------------------------------------------------------

    /// Authorized GET returning JSON.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.send_with_renewal(Method::GET, path, None).await?;
        Self::decode(resp).await
    }

    /// Authorized POST with a JSON body.
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let resp = self
            .send_with_renewal(Method::POST, path, Some(body))
            .await?;
        Self::decode(resp).await
    }

    /// Authorized PUT with a JSON body.
    pub async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let resp = self.send_with_renewal(Method::PUT, path, Some(body)).await?;
        Self::decode(resp).await
    }

    /// Authorized DELETE; tolerates an empty response body.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let resp = self.send_with_renewal(Method::DELETE, path, None).await?;
        Self::check(resp).await.map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Session layer
    // -----------------------------------------------------------------------

    /// Send a request with the held access token; on an authentication
    /// failure, run exactly one (possibly shared) renewal cycle and replay
    /// the request once with the new credential.
    async fn send_with_renewal(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<reqwest::Response> {
        let bearer = self.access_token().await;
        let resp = self
            .dispatch(method.clone(), path, body.as_ref(), bearer.as_deref())
            .await?;

        if resp.status() != reqwest::StatusCode::UNAUTHORIZED || is_renewal_exempt(path) {
            return Ok(resp);
        }

        debug!(path, "authentication failure, entering renewal");
        let tokens = self.renew().await?;
        // The replay's outcome is final — a second failure propagates.
        self.dispatch(method, path, body.as_ref(), Some(&tokens.access_token))
            .await
    }

    async fn renew(&self) -> Result<SessionTokens> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .renewal
            .renew(move || perform_rotation(inner).boxed())
            .await
            .map_err(|e| {
                debug!(error = %e, "renewal failed");
                ClientError::SessionExpired
            })
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.inner.base_url, path);
        let mut request = self.inner.http.request(method, &url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.json::<ApiErrorBody>().await.unwrap_or(ApiErrorBody {
            error: "unknown".into(),
            message: status.to_string(),
        });
        Err(ClientError::Api {
            status: status.as_u16(),
            code: body.error,
            message: body.message,
        })
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let resp = Self::check(resp).await?;
        Ok(resp.json().await?)
    }
}

/// The single rotation attempt behind a renewal cycle.
///
/// Success stores the fresh pair; any failure — no refresh token, transport
/// error, timeout, or a rejection from the server — clears credentials so
/// the caller lands on the login surface rather than in a half-authenticated
/// state.
async fn perform_rotation(
    inner: Arc<ClientInner>,
) -> std::result::Result<SessionTokens, RenewalError> {
    let refresh = inner
        .session
        .read()
        .await
        .as_ref()
        .map(|s| s.refresh_token.clone());
    let Some(refresh_token) = refresh else {
        *inner.session.write().await = None;
        return Err(RenewalError::NoRefreshToken);
    };

    let url = format!("{}/auth/refresh", inner.base_url);
    let body = serde_json::json!({ "refreshToken": refresh_token });
    let outcome = async {
        let resp = inner
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RenewalError::Rejected(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RenewalError::Rejected(format!("rotation returned {status}")));
        }
        let body: RefreshResponseBody = resp
            .json()
            .await
            .map_err(|e| RenewalError::Rejected(e.to_string()))?;
        Ok(SessionTokens {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
        })
    }
    .await;

    match outcome {
        Ok(tokens) => {
            *inner.session.write().await = Some(tokens.clone());
            info!("session renewed");
            Ok(tokens)
        }
        Err(e) => {
            *inner.session.write().await = None;
            warn!(error = %e, "session renewal failed, credentials cleared");
            Err(e)
        }
    }
}
