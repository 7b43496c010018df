//! Session-layer tests against an in-process mock API.
//!
//! The mock tracks how many rotation calls it receives, which is what the
//! coalescing guarantees are asserted against: N concurrent requests that
//! all hit an expired access token must produce exactly one rotation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::future::join_all;

use jobtrail_client::{ApiClient, ClientError, SessionTokens};

#[derive(Clone)]
struct Mock {
    inner: Arc<MockInner>,
}

struct MockInner {
    refresh_calls: AtomicUsize,
    generation: AtomicUsize,
    fail_refresh: AtomicBool,
    reject_all_data: AtomicBool,
    refresh_delay: Duration,
    valid_access: Mutex<String>,
    valid_refresh: Mutex<String>,
}

impl Mock {
    fn refresh_calls(&self) -> usize {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }

    /// Invalidate the client-held access token without touching the refresh
    /// token, as an expiry would.
    fn expire_access(&self) {
        *self.inner.valid_access.lock().unwrap() = "rotated-out-of-band".into();
    }
}

fn unauthorized() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "unauthorized",
            "message": "Invalid or expired token"
        })),
    )
}

fn bearer_matches(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {expected}"))
}

async fn refresh_endpoint(
    State(mock): State<Mock>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    mock.inner.refresh_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(mock.inner.refresh_delay).await;

    if mock.inner.fail_refresh.load(Ordering::SeqCst) {
        return unauthorized();
    }

    let presented = body["refreshToken"].as_str().unwrap_or_default().to_string();
    let expected = mock.inner.valid_refresh.lock().unwrap().clone();
    if presented != expected {
        return unauthorized();
    }

    let generation = mock.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let access = format!("access-{generation}");
    let refresh = format!("refresh-{generation}");
    *mock.inner.valid_access.lock().unwrap() = access.clone();
    *mock.inner.valid_refresh.lock().unwrap() = refresh.clone();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "accessToken": access,
            "refreshToken": refresh
        })),
    )
}

async fn data_endpoint(
    State(mock): State<Mock>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    if mock.inner.reject_all_data.load(Ordering::SeqCst) {
        return unauthorized();
    }
    let expected = mock.inner.valid_access.lock().unwrap().clone();
    if bearer_matches(&headers, &expected) {
        (
            StatusCode::OK,
            Json(serde_json::json!({ "resource": "applications" })),
        )
    } else {
        unauthorized()
    }
}

async fn other_data_endpoint(
    State(mock): State<Mock>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    let expected = mock.inner.valid_access.lock().unwrap().clone();
    if bearer_matches(&headers, &expected) {
        (
            StatusCode::OK,
            Json(serde_json::json!({ "resource": "companies" })),
        )
    } else {
        unauthorized()
    }
}

async fn login_endpoint(
    State(mock): State<Mock>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    if body["password"].as_str() != Some("pw12345678") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "unauthorized",
                "message": "Invalid credentials"
            })),
        );
    }
    let access = mock.inner.valid_access.lock().unwrap().clone();
    let refresh = mock.inner.valid_refresh.lock().unwrap().clone();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "user": { "id": 1, "email": body["email"], "name": null },
            "accessToken": access,
            "refreshToken": refresh
        })),
    )
}

/// Start the mock API on an ephemeral port. Returns its base URL and a
/// handle for assertions.
async fn spawn_mock(refresh_delay: Duration) -> (String, Mock) {
    let mock = Mock {
        inner: Arc::new(MockInner {
            refresh_calls: AtomicUsize::new(0),
            generation: AtomicUsize::new(0),
            fail_refresh: AtomicBool::new(false),
            reject_all_data: AtomicBool::new(false),
            refresh_delay,
            valid_access: Mutex::new("access-0".into()),
            valid_refresh: Mutex::new("refresh-0".into()),
        }),
    };

    let app = Router::new()
        .route("/auth/refresh", post(refresh_endpoint))
        .route("/auth/login", post(login_endpoint))
        .route("/api/applications", get(data_endpoint))
        .route("/api/companies", get(other_data_endpoint))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), mock)
}

/// A client holding a stale access token but a valid refresh token.
async fn seeded_client(base_url: &str) -> ApiClient {
    let client = ApiClient::new(base_url).unwrap();
    client
        .set_session(SessionTokens {
            access_token: "stale-access".into(),
            refresh_token: "refresh-0".into(),
        })
        .await;
    client
}

#[tokio::test]
async fn concurrent_auth_failures_coalesce_into_one_rotation() {
    let (base_url, mock) = spawn_mock(Duration::from_millis(200)).await;
    let client = seeded_client(&base_url).await;

    let requests = (0..8).map(|_| {
        let client = client.clone();
        async move { client.get::<serde_json::Value>("/api/applications").await }
    });
    let results = join_all(requests).await;

    for result in results {
        assert_eq!(result.unwrap()["resource"], "applications");
    }
    assert_eq!(mock.refresh_calls(), 1);

    // The stored pair is the rotated one.
    let session = client.session().await.unwrap();
    assert_eq!(session.refresh_token, "refresh-1");
}

#[tokio::test]
async fn queued_callers_each_receive_their_own_response() {
    let (base_url, mock) = spawn_mock(Duration::from_millis(200)).await;
    let client = seeded_client(&base_url).await;

    let a = client.clone();
    let b = client.clone();
    let (applications, companies) = tokio::join!(
        a.get::<serde_json::Value>("/api/applications"),
        b.get::<serde_json::Value>("/api/companies"),
    );

    assert_eq!(applications.unwrap()["resource"], "applications");
    assert_eq!(companies.unwrap()["resource"], "companies");
    assert_eq!(mock.refresh_calls(), 1);
}

#[tokio::test]
async fn failed_renewal_rejects_every_waiter_and_clears_credentials() {
    let (base_url, mock) = spawn_mock(Duration::from_millis(200)).await;
    mock.inner.fail_refresh.store(true, Ordering::SeqCst);
    let client = seeded_client(&base_url).await;

    let requests = (0..5).map(|_| {
        let client = client.clone();
        async move { client.get::<serde_json::Value>("/api/applications").await }
    });
    let results = join_all(requests).await;

    for result in results {
        assert!(matches!(result, Err(ClientError::SessionExpired)));
    }
    assert_eq!(mock.refresh_calls(), 1);
    assert!(client.session().await.is_none());
}

#[tokio::test]
async fn missing_refresh_token_fails_without_a_rotation_call() {
    let (base_url, mock) = spawn_mock(Duration::ZERO).await;
    let client = ApiClient::new(&base_url).unwrap();

    let result = client.get::<serde_json::Value>("/api/applications").await;

    assert!(matches!(result, Err(ClientError::SessionExpired)));
    assert_eq!(mock.refresh_calls(), 0);
}

#[tokio::test]
async fn replayed_request_is_retried_only_once() {
    let (base_url, mock) = spawn_mock(Duration::ZERO).await;
    mock.inner.reject_all_data.store(true, Ordering::SeqCst);
    let client = seeded_client(&base_url).await;

    let result = client.get::<serde_json::Value>("/api/applications").await;

    // Renewal succeeded, the replay still failed: the failure propagates
    // as-is instead of looping back into another renewal.
    match result {
        Err(ClientError::Api { status, .. }) => assert_eq!(status, 401),
        other => panic!("expected api error, got {other:?}"),
    }
    assert_eq!(mock.refresh_calls(), 1);
}

#[tokio::test]
async fn unauthenticated_endpoints_never_trigger_renewal() {
    let (base_url, mock) = spawn_mock(Duration::ZERO).await;
    let client = seeded_client(&base_url).await;

    let result = client.login("alice@example.com", "wrong-password").await;

    match result {
        Err(ClientError::Api { status, .. }) => assert_eq!(status, 401),
        other => panic!("expected api error, got {other:?}"),
    }
    assert_eq!(mock.refresh_calls(), 0);
}

#[tokio::test]
async fn each_expiry_cycle_renews_exactly_once() {
    let (base_url, mock) = spawn_mock(Duration::from_millis(50)).await;
    let client = seeded_client(&base_url).await;

    let first: serde_json::Value = client.get("/api/applications").await.unwrap();
    assert_eq!(first["resource"], "applications");
    assert_eq!(mock.refresh_calls(), 1);

    // Second expiry later on must start a fresh renewal cycle rather than
    // reusing the settled one.
    mock.expire_access();
    let second: serde_json::Value = client.get("/api/applications").await.unwrap();
    assert_eq!(second["resource"], "applications");
    assert_eq!(mock.refresh_calls(), 2);
}

#[tokio::test]
async fn login_then_authorized_request_needs_no_renewal() {
    let (base_url, mock) = spawn_mock(Duration::ZERO).await;
    let client = ApiClient::new(&base_url).unwrap();

    let session = client.login("alice@example.com", "pw12345678").await.unwrap();
    assert_eq!(session.user.email, "alice@example.com");

    let data: serde_json::Value = client.get("/api/applications").await.unwrap();
    assert_eq!(data["resource"], "applications");
    assert_eq!(mock.refresh_calls(), 0);
}
