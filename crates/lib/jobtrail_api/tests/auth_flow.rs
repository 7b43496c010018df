//! End-to-end auth flow tests against a real PostgreSQL database.
//!
//! These exercise the full router: registration, login, single-use refresh
//! rotation, logout, the password-reset lifecycle, and the account surface.
//! They are skipped with a notice when `DATABASE_URL` is not set.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use jobtrail_api::config::ApiConfig;
use jobtrail_api::services::oauth::OAuthStateStore;
use jobtrail_api::{AppState, router};
use jobtrail_core::mailer::{Mailer, MailerError};

const TEST_PASSWORD: &str = "pw12345678";

/// Mailer that records outbound messages for assertions.
#[derive(Default)]
struct CaptureMailer {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl CaptureMailer {
    /// Reset token carried by the most recent message, if any.
    fn last_reset_token(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let (_, _, body) = sent.last()?;
        let start = body.find("token=")? + "token=".len();
        let rest = &body[start..];
        let end = rest
            .find(|c: char| c.is_whitespace())
            .unwrap_or(rest.len());
        Some(rest[..end].to_string())
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for CaptureMailer {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), MailerError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.into(), subject.into(), body.into()));
        Ok(())
    }
}

struct TestApp {
    app: Router,
    pool: PgPool,
    mailer: Arc<CaptureMailer>,
}

/// Build the app against `DATABASE_URL`, or `None` to skip the test.
async fn test_app() -> Option<TestApp> {
    let database_url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("connect to test database");
    jobtrail_api::migrate(&pool).await.expect("run migrations");

    let mailer = Arc::new(CaptureMailer::default());
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        database_url,
        jwt_secret: "test-secret".into(),
        public_url: "http://127.0.0.1:3400".into(),
        frontend_url: "http://localhost:5173".into(),
        google: None,
        github: None,
    };
    let state = AppState {
        pool: pool.clone(),
        config,
        http: reqwest::Client::new(),
        oauth_state: Arc::new(OAuthStateStore::new()),
        mailer: mailer.clone(),
    };
    Some(TestApp {
        app: router(state),
        pool,
        mailer,
    })
}

/// Unique email per test run so tests never collide in a shared database.
fn unique_email(tag: &str) -> String {
    format!("{tag}-{}@example.com", jobtrail_core::uuid::uuidv7().simple())
}

async fn send(
    app: &Router,
    method: &str,
    path: &str,
    bearer: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value, Vec<u8>) {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = builder
        .body(match body {
            Some(v) => Body::from(serde_json::to_vec(&v).unwrap()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body")
        .to_vec();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json, bytes)
}

async fn register(app: &Router, email: &str) -> (String, String) {
    let (status, body, _) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(serde_json::json!({ "email": email, "password": TEST_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    (
        body["accessToken"].as_str().unwrap().to_string(),
        body["refreshToken"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn register_login_and_rotation_scenario() {
    let Some(t) = test_app().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let email = unique_email("alice");

    // Register returns 201 with both tokens.
    let (status, body, _) = send(
        &t.app,
        "POST",
        "/auth/register",
        None,
        Some(serde_json::json!({ "email": email, "password": TEST_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], email.as_str());
    let original_refresh = body["refreshToken"].as_str().unwrap().to_string();

    // Wrong password is a 401.
    let (status, _, _) = send(
        &t.app,
        "POST",
        "/auth/login",
        None,
        Some(serde_json::json!({ "email": email, "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Rotation succeeds and yields a different refresh token.
    let (status, body, _) = send(
        &t.app,
        "POST",
        "/auth/refresh",
        None,
        Some(serde_json::json!({ "refreshToken": original_refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rotated_refresh = body["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rotated_refresh, original_refresh);

    // The consumed token is single-use: a second rotation with it fails.
    let (status, _, _) = send(
        &t.app,
        "POST",
        "/auth/refresh",
        None,
        Some(serde_json::json!({ "refreshToken": original_refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The rotated token still works.
    let (status, _, _) = send(
        &t.app,
        "POST",
        "/auth/refresh",
        None,
        Some(serde_json::json!({ "refreshToken": rotated_refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let Some(t) = test_app().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let email = unique_email("dup");
    register(&t.app, &email).await;

    let (status, body, _) = send(
        &t.app,
        "POST",
        "/auth/register",
        None,
        Some(serde_json::json!({ "email": email, "password": TEST_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn logout_never_fails_and_revokes_the_session() {
    let Some(t) = test_app().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let email = unique_email("logout");
    let (_, refresh) = register(&t.app, &email).await;

    // Garbage token still yields success.
    let (status, _, _) = send(
        &t.app,
        "POST",
        "/auth/logout",
        None,
        Some(serde_json::json!({ "refreshToken": "garbage" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Missing token too.
    let (status, _, _) = send(
        &t.app,
        "POST",
        "/auth/logout",
        None,
        Some(serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // A real logout consumes the ledger entry: rotation afterwards fails.
    let (status, _, _) = send(
        &t.app,
        "POST",
        "/auth/logout",
        None,
        Some(serde_json::json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(
        &t.app,
        "POST",
        "/auth/refresh",
        None,
        Some(serde_json::json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forgot_password_responses_are_byte_identical() {
    let Some(t) = test_app().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };

    // A real password-holding account.
    let with_password = unique_email("enum-real");
    register(&t.app, &with_password).await;

    // An account created from an external identity: no password.
    let oauth_only = unique_email("enum-oauth");
    jobtrail_core::auth::queries::create_user(&t.pool, &oauth_only, None, None)
        .await
        .unwrap();

    let unknown = unique_email("enum-unknown");

    let mut bodies = Vec::new();
    for email in [&with_password, &oauth_only, &unknown] {
        let (status, _, bytes) = send(
            &t.app,
            "POST",
            "/auth/forgot-password",
            None,
            Some(serde_json::json!({ "email": email })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        bodies.push(bytes);
    }

    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[1], bodies[2]);

    // Only the real account produced an email.
    assert_eq!(t.mailer.sent_count(), 1);
}

#[tokio::test]
async fn reset_flow_invalidates_every_session() {
    let Some(t) = test_app().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let email = unique_email("reset");
    let (_, refresh_one) = register(&t.app, &email).await;

    // A second device logs in, holding its own refresh token.
    let (status, body, _) = send(
        &t.app,
        "POST",
        "/auth/login",
        None,
        Some(serde_json::json!({ "email": email, "password": TEST_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let refresh_two = body["refreshToken"].as_str().unwrap().to_string();

    // Fabricated reset tokens are rejected.
    let (status, body, _) = send(
        &t.app,
        "POST",
        "/auth/reset-password",
        None,
        Some(serde_json::json!({ "token": "fabricated", "newPassword": "pw-new-12345" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_reset_token");

    // Request a reset and use the emailed token.
    let (status, _, _) = send(
        &t.app,
        "POST",
        "/auth/forgot-password",
        None,
        Some(serde_json::json!({ "email": email })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = t.mailer.last_reset_token().expect("reset email captured");

    let (status, _, _) = send(
        &t.app,
        "POST",
        "/auth/reset-password",
        None,
        Some(serde_json::json!({ "token": token, "newPassword": "pw-new-12345" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Every previously issued refresh token now fails rotation.
    for refresh in [&refresh_one, &refresh_two] {
        let (status, _, _) = send(
            &t.app,
            "POST",
            "/auth/refresh",
            None,
            Some(serde_json::json!({ "refreshToken": refresh })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // The reset token is itself single-use.
    let (status, _, _) = send(
        &t.app,
        "POST",
        "/auth/reset-password",
        None,
        Some(serde_json::json!({ "token": token, "newPassword": "pw-newer-12345" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The old password is gone, the new one works.
    let (status, _, _) = send(
        &t.app,
        "POST",
        "/auth/login",
        None,
        Some(serde_json::json!({ "email": email, "password": TEST_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, _) = send(
        &t.app,
        "POST",
        "/auth/login",
        None,
        Some(serde_json::json!({ "email": email, "password": "pw-new-12345" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn me_reports_derived_flags() {
    let Some(t) = test_app().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let email = unique_email("me");
    let (access, _) = register(&t.app, &email).await;

    let (status, body, _) = send(&t.app, "GET", "/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], email.as_str());
    assert_eq!(body["has_password"], true);
    assert_eq!(body["google_connected"], false);
    assert_eq!(body["github_connected"], false);

    // No token at all is a 401.
    let (status, _, _) = send(&t.app, "GET", "/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_password_requires_the_current_one() {
    let Some(t) = test_app().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let email = unique_email("chpw");
    let (access, _) = register(&t.app, &email).await;

    // Missing current password.
    let (status, _, _) = send(
        &t.app,
        "PUT",
        "/auth/password",
        Some(&access),
        Some(serde_json::json!({ "newPassword": "pw-new-12345" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Wrong current password.
    let (status, _, _) = send(
        &t.app,
        "PUT",
        "/auth/password",
        Some(&access),
        Some(serde_json::json!({
            "currentPassword": "wrong-password",
            "newPassword": "pw-new-12345"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Correct current password.
    let (status, _, _) = send(
        &t.app,
        "PUT",
        "/auth/password",
        Some(&access),
        Some(serde_json::json!({
            "currentPassword": TEST_PASSWORD,
            "newPassword": "pw-new-12345"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(
        &t.app,
        "POST",
        "/auth/login",
        None,
        Some(serde_json::json!({ "email": email, "password": "pw-new-12345" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn account_update_and_delete() {
    let Some(t) = test_app().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let email = unique_email("account");
    let (access, refresh) = register(&t.app, &email).await;

    let (status, body, _) = send(
        &t.app,
        "PUT",
        "/auth/account",
        Some(&access),
        Some(serde_json::json!({ "name": "Alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Alice");

    // Renaming onto an existing email conflicts.
    let other = unique_email("account-other");
    register(&t.app, &other).await;
    let (status, _, _) = send(
        &t.app,
        "PUT",
        "/auth/account",
        Some(&access),
        Some(serde_json::json!({ "email": other })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Deletion cascades the ledgers: the refresh token dies with the user.
    let (status, _, _) = send(&t.app, "DELETE", "/auth/account", Some(&access), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) = send(
        &t.app,
        "POST",
        "/auth/refresh",
        None,
        Some(serde_json::json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(&t.app, "GET", "/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unconfigured_oauth_provider_is_a_fixed_501() {
    let Some(t) = test_app().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };

    let (status, body, _) = send(&t.app, "GET", "/auth/google", None, None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body["error"], "not_implemented");

    let (status, _, _) = send(&t.app, "GET", "/auth/github/callback?code=x&state=y", None, None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    let (status, _, _) = send(&t.app, "GET", "/auth/unknown", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
