/// HTTP token vault tests
///
/// Runs the store against a local axum server that speaks the bulk token
/// protocol.
/// Run with: cargo test --test http_vault_tests

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value as JsonValue, json};
use tokio::sync::Mutex;
use userstore::{
    HttpTokenVault, Record, SqliteBackend, StoreConfig, StoreError, TokenBatch, TokenVault,
    UserQuery, UserStore,
};

#[derive(Clone, Default)]
struct MockVault {
    requests: Arc<Mutex<Vec<(Option<String>, TokenBatch)>>>,
}

async fn bulk(
    State(mock): State<MockVault>,
    headers: HeaderMap,
    Json(batch): Json<TokenBatch>,
) -> Json<JsonValue> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let created: BTreeMap<String, String> = batch
        .create
        .keys()
        .map(|column| (column.clone(), format!("tk_{column}_1")))
        .collect();

    mock.requests.lock().await.push((auth, batch));
    Json(json!({ "created": created }))
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "vault is down")
}

async fn forgetful() -> Json<JsonValue> {
    Json(json!({ "created": {} }))
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn store_with(vault: HttpTokenVault) -> UserStore {
    let store = UserStore::new(StoreConfig::default().sensitive_columns(["email"]))
        .unwrap()
        .with_backend(Arc::new(SqliteBackend::open_in_memory().unwrap()))
        .with_vault(Arc::new(vault));
    store.auto_migrate().await.unwrap();
    store
}

#[tokio::test]
async fn test_bulk_request_round_trip() {
    let mock = MockVault::default();
    let base = serve(
        Router::new()
            .route("/tokens/bulk", post(bulk))
            .with_state(mock.clone()),
    )
    .await;

    let vault = HttpTokenVault::new(&base).unwrap().auth_token("secret");
    let store = store_with(vault).await;

    let mut user = Record::new_user();
    user.set_email("a@x.com");
    store.user_create(&mut user).await.unwrap();
    assert_eq!(user.email(), "tk_email_1");

    user.set_email("b@x.com");
    store.user_update(&mut user).await.unwrap();

    let requests = mock.requests.lock().await;
    assert_eq!(requests.len(), 2);

    let (auth, first) = &requests[0];
    assert_eq!(auth.as_deref(), Some("Bearer secret"));
    assert_eq!(first.create.get("email").map(String::as_str), Some("a@x.com"));

    let (_, second) = &requests[1];
    assert!(second.create.is_empty());
    assert_eq!(
        second.update.get("tk_email_1").map(String::as_str),
        Some("b@x.com")
    );
}

#[tokio::test]
async fn test_server_error_aborts_the_write() {
    let base = serve(Router::new().route("/tokens/bulk", post(broken))).await;
    let store = store_with(HttpTokenVault::new(&base).unwrap()).await;

    let mut user = Record::new_user();
    user.set_email("a@x.com");
    let err = store.user_create(&mut user).await.unwrap_err();

    match err {
        StoreError::Vault(message) => assert!(message.contains("vault is down")),
        other => panic!("expected vault error, got {other:?}"),
    }
    assert_eq!(store.user_count(&UserQuery::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_created_token_is_an_error() {
    let base = serve(Router::new().route("/tokens/bulk", post(forgetful))).await;
    let vault = HttpTokenVault::new(&base).unwrap();

    let mut batch = TokenBatch::default();
    batch.create.insert("email".into(), "a@x.com".into());
    let err = vault.reconcile(batch).await.unwrap_err();
    assert!(err.is_vault());
}

#[tokio::test]
async fn test_unreachable_vault_is_a_vault_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let vault = HttpTokenVault::new(&format!("http://{addr}")).unwrap();
    let mut batch = TokenBatch::default();
    batch.delete.push("tk_1".into());
    assert!(vault.reconcile(batch).await.unwrap_err().is_vault());
}
