//! Session store integration tests against an in-process mock API

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use instikit_client::{ApiClient, AuthApi, AuthHandle, ProfileUpdate};
use instikit_core::{InstikitConfig, InstikitError};
use instikit_session::{
    CredentialStore, Role, SessionEvent, SessionStatus, SessionStore,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const VALID_TOKEN: &str = "tok-valid";

fn user_json() -> Value {
    json!({
        "id": "u-17",
        "username": "asha",
        "role": "student",
        "needs_password_reset": false,
        "full_name": "Asha Rao"
    })
}

fn bearer_of(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Mock institute API: login, identity check, profile update, plus a
/// protected route that always rejects the credential.
async fn serve_mock_api() -> SocketAddr {
    let app = Router::new()
        .route(
            "/api/auth/login",
            post(|Json(body): Json<Value>| async move {
                if body["password"] == json!("letmein") {
                    Json(json!({
                        "success": true,
                        "data": { "token": VALID_TOKEN, "user": user_json() }
                    }))
                    .into_response()
                } else {
                    (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({ "success": false, "message": "invalid credentials" })),
                    )
                        .into_response()
                }
            }),
        )
        .route(
            "/api/auth/me",
            get(|headers: HeaderMap| async move {
                if bearer_of(&headers) == Some(VALID_TOKEN) {
                    Json(json!({ "success": true, "data": user_json() })).into_response()
                } else {
                    StatusCode::UNAUTHORIZED.into_response()
                }
            }),
        )
        .route(
            "/api/auth/profile",
            patch(|headers: HeaderMap, Json(body): Json<Value>| async move {
                if bearer_of(&headers) != Some(VALID_TOKEN) {
                    return StatusCode::UNAUTHORIZED.into_response();
                }
                let mut user = user_json();
                if let Some(full_name) = body.get("full_name") {
                    user["full_name"] = full_name.clone();
                }
                Json(json!({ "success": true, "data": user })).into_response()
            }),
        )
        .route(
            "/api/protected",
            get(|| async { StatusCode::UNAUTHORIZED }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn build_store(addr: SocketAddr, data_dir: &Path) -> (Arc<SessionStore>, Arc<ApiClient>) {
    let mut config = InstikitConfig::default();
    config.http.base_url = format!("http://{}/api", addr);
    config.retry.base_delay_ms = 10;

    let client = Arc::new(ApiClient::new(&config, AuthHandle::new()).unwrap());
    let credentials = CredentialStore::new(data_dir).unwrap();
    let store = SessionStore::new(AuthApi::new(client.clone()), credentials);
    (store, client)
}

#[tokio::test]
async fn initialize_without_credential_is_anonymous() {
    let addr = serve_mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let (store, _) = build_store(addr, dir.path());

    let snapshot = store.initialize().await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Anonymous);
    assert!(snapshot.identity.is_none());
}

#[tokio::test]
async fn initialize_with_valid_credential_authenticates() {
    let addr = serve_mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    CredentialStore::new(dir.path())
        .unwrap()
        .store(VALID_TOKEN)
        .unwrap();

    let (store, _) = build_store(addr, dir.path());
    let snapshot = store.initialize().await.unwrap();

    assert_eq!(snapshot.status, SessionStatus::Authenticated);
    assert_eq!(snapshot.identity.unwrap().username, "asha");
}

#[tokio::test]
async fn initialize_with_rejected_credential_discards_it() {
    let addr = serve_mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let credentials = CredentialStore::new(dir.path()).unwrap();
    credentials.store("tok-dead").unwrap();

    let (store, _) = build_store(addr, dir.path());
    let snapshot = store.initialize().await.unwrap();

    assert_eq!(snapshot.status, SessionStatus::Anonymous);
    assert!(snapshot.identity.is_none());
    // The dead token must not survive to the next startup.
    assert_eq!(credentials.load().unwrap(), None);
}

#[tokio::test]
async fn login_persists_credential_and_emits_event() {
    let addr = serve_mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let (store, _) = build_store(addr, dir.path());
    store.initialize().await.unwrap();

    let mut events = store.subscribe();
    let identity = store
        .login("asha", "letmein", Some(Role::Student))
        .await
        .unwrap();
    assert_eq!(identity.role, Role::Student);

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Authenticated);
    assert_eq!(
        CredentialStore::new(dir.path()).unwrap().load().unwrap(),
        Some(VALID_TOKEN.to_string())
    );

    match events.recv().await.unwrap() {
        SessionEvent::Authenticated { identity, .. } => assert_eq!(identity.username, "asha"),
        other => panic!("expected authenticated event, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_login_leaves_state_unchanged() {
    let addr = serve_mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let (store, _) = build_store(addr, dir.path());
    store.initialize().await.unwrap();

    let err = store.login("asha", "wrong", None).await.unwrap_err();
    assert!(matches!(err, InstikitError::Validation { status: 401, .. }));

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Anonymous);
    assert!(snapshot.last_error.is_some());
    assert_eq!(
        CredentialStore::new(dir.path()).unwrap().load().unwrap(),
        None
    );
}

#[tokio::test]
async fn logout_is_idempotent() {
    let addr = serve_mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let (store, _) = build_store(addr, dir.path());
    store.initialize().await.unwrap();
    store.login("asha", "letmein", None).await.unwrap();

    let mut events = store.subscribe();
    store.logout().await.unwrap();
    store.logout().await.unwrap();

    assert_eq!(store.snapshot().await.status, SessionStatus::Anonymous);
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::Anonymous { .. }
    ));
    // The second logout emitted nothing.
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn update_profile_merges_without_touching_status() {
    let addr = serve_mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let (store, _) = build_store(addr, dir.path());
    store.initialize().await.unwrap();
    store.login("asha", "letmein", None).await.unwrap();

    let update = ProfileUpdate {
        full_name: Some("Asha R. Rao".to_string()),
        ..Default::default()
    };
    let identity = store.update_profile(&update).await.unwrap();
    assert_eq!(identity.full_name.as_deref(), Some("Asha R. Rao"));

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Authenticated);
    assert_eq!(
        snapshot.identity.unwrap().full_name.as_deref(),
        Some("Asha R. Rao")
    );
}

#[tokio::test]
async fn update_profile_requires_a_session() {
    let addr = serve_mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let (store, _) = build_store(addr, dir.path());
    store.initialize().await.unwrap();

    let err = store
        .update_profile(&ProfileUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, InstikitError::Session { .. }));
}

#[tokio::test]
async fn concurrent_401s_tear_down_exactly_once() {
    let addr = serve_mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let (store, client) = build_store(addr, dir.path());
    store.initialize().await.unwrap();
    store.login("asha", "letmein", None).await.unwrap();

    let mut events = store.subscribe();

    // Two in-flight requests both report the same dead credential.
    let (a, b) = tokio::join!(
        client.get::<Value>("/protected"),
        client.get::<Value>("/protected")
    );
    assert!(matches!(a.unwrap_err(), InstikitError::AuthExpired));
    assert!(matches!(b.unwrap_err(), InstikitError::AuthExpired));

    // Exactly one transition to anonymous, one credential removal.
    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("teardown event")
        .unwrap();
    assert!(matches!(event, SessionEvent::Anonymous { .. }));
    assert!(events.try_recv().is_err());

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Anonymous);
    assert_eq!(
        CredentialStore::new(dir.path()).unwrap().load().unwrap(),
        None
    );
}

#[tokio::test]
async fn stale_expiry_signal_cannot_end_a_new_session() {
    let addr = serve_mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let (store, _) = build_store(addr, dir.path());
    store.initialize().await.unwrap();

    store.login("asha", "letmein", None).await.unwrap();
    let old_generation = store.auth().current_generation();

    store.logout().await.unwrap();
    store.login("asha", "letmein", None).await.unwrap();

    // A late 401 from a request issued under the old session.
    assert!(!store.force_anonymous(old_generation).await);
    assert_eq!(store.snapshot().await.status, SessionStatus::Authenticated);
}
