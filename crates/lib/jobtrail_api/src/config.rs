//! API server configuration.

use jobtrail_core::auth::token::resolve_jwt_secret;

/// Credentials for one OAuth provider.
#[derive(Clone, Debug)]
pub struct OAuthProviderSettings {
    pub client_id: String,
    pub client_secret: String,
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3400").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Externally reachable base URL of this API (OAuth redirect URIs).
    pub public_url: String,
    /// Base URL of the browser client (reset links, OAuth handoff).
    pub frontend_url: String,
    /// Google OAuth credentials, when configured.
    pub google: Option<OAuthProviderSettings>,
    /// GitHub OAuth credentials, when configured.
    pub github: Option<OAuthProviderSettings>,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `BIND_ADDR` | `127.0.0.1:3400` |
    /// | `DATABASE_URL` | `postgres://localhost:5432/jobtrail` |
    /// | `JWT_SECRET` | generated & persisted to file |
    /// | `PUBLIC_URL` | `http://127.0.0.1:3400` |
    /// | `FRONTEND_URL` | `http://localhost:5173` |
    /// | `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET` | unset ⇒ provider disabled |
    /// | `GITHUB_CLIENT_ID` / `GITHUB_CLIENT_SECRET` | unset ⇒ provider disabled |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3400".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/jobtrail".into()),
            jwt_secret: resolve_jwt_secret(),
            public_url: std::env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3400".into()),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
            google: provider_from_env("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
            github: provider_from_env("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"),
        }
    }
}

fn provider_from_env(id_var: &str, secret_var: &str) -> Option<OAuthProviderSettings> {
    let client_id = std::env::var(id_var).ok().filter(|v| !v.is_empty())?;
    let client_secret = std::env::var(secret_var).ok().filter(|v| !v.is_empty())?;
    Some(OAuthProviderSettings {
        client_id,
        client_secret,
    })
}
