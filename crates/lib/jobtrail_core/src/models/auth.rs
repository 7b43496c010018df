//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API wire models
//! (which carry `#[serde(rename)]` for camelCase etc.).

use serde::{Deserialize, Serialize};

/// Domain user as exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
}

/// Full user row, including credential and linked-identity state.
///
/// `password_hash` is `None` for OAuth-only accounts.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub github_id: Option<String>,
}

impl UserRecord {
    pub fn user(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

/// External identity providers that can be linked to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    /// Wire name used in URLs and redirect error codes.
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
        }
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(OAuthProvider::Google),
            "github" => Ok(OAuthProvider::Github),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind discriminator embedded in every signed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims for both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject — user ID.
    pub sub: i64,
    /// Token kind (`access` or `refresh`).
    pub kind: TokenKind,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// Refresh token ledger row.
///
/// `token_hash` is a salted one-way digest of the bearer token; the bearer
/// value itself is never stored.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: uuid::Uuid,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Password-reset token ledger row.
#[derive(Debug, Clone)]
pub struct ResetTokenRecord {
    pub id: uuid::Uuid,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}
