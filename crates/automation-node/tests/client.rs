//! Session handling of the node client against an in-process fake API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy_primitives::Address;
use automation_node::{NodeClient, NodeError};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio_util::sync::CancellationToken;

const SESSION: &str = "clsession=fake-session";
const KEY: Address = Address::repeat_byte(0x21);

#[derive(Default)]
struct Counters {
    sessions: usize,
    requests: usize,
    /// Authenticated requests still to be rejected with 401.
    reject: usize,
    import_password: Option<String>,
}

type Shared = Arc<Mutex<Counters>>;

async fn sessions(State(api): State<Shared>) -> Response {
    api.lock().unwrap().sessions += 1;
    (
        [(header::SET_COOKIE, format!("{SESSION}; Path=/"))],
        Json(json!({ "data": { "id": "session", "attributes": {} } })),
    )
        .into_response()
}

/// Counts the request; answers 401 while rejections remain or the
/// cookie is missing.
fn admit(api: &Shared, headers: &HeaderMap) -> Result<(), Response> {
    let mut api = api.lock().unwrap();
    api.requests += 1;
    let has_cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(SESSION));
    if !has_cookie || api.reject > 0 {
        api.reject = api.reject.saturating_sub(1);
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "errors": [{ "detail": "Unauthorized" }] })),
        )
            .into_response());
    }
    Ok(())
}

async fn eth_keys(State(api): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(resp) = admit(&api, &headers) {
        return resp;
    }
    Json(json!({ "data": [{ "id": KEY.to_string(), "attributes": { "address": KEY.to_string() } }] }))
        .into_response()
}

async fn import_key(
    State(api): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = admit(&api, &headers) {
        return resp;
    }
    api.lock().unwrap().import_password = query.get("oldpassword").cloned();
    Json(json!({ "data": { "id": KEY.to_string(), "attributes": { "address": KEY.to_string() } } }))
        .into_response()
}

async fn fake_node(reject: usize) -> (String, Shared) {
    let api: Shared = Arc::new(Mutex::new(Counters {
        reject,
        ..Default::default()
    }));
    let router = Router::new()
        .route("/sessions", post(sessions))
        .route("/v2/keys/evm", get(eth_keys))
        .route("/v2/keys/evm/import", post(import_key))
        .with_state(api.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://127.0.0.1:{port}"), api)
}

async fn authenticated(url: &str) -> NodeClient {
    let client = NodeClient::new(url, "admin@example.com", "password").unwrap();
    client.authenticate(&CancellationToken::new()).await.unwrap();
    client
}

#[tokio::test]
async fn expired_session_is_renewed_once() {
    let (url, api) = fake_node(1).await;
    let client = authenticated(&url).await;

    let keys = client.eth_keys(&CancellationToken::new()).await.unwrap();
    assert_eq!(keys, vec![KEY]);

    let api = api.lock().unwrap();
    assert_eq!(api.sessions, 2);
    assert_eq!(api.requests, 2);
}

#[tokio::test]
async fn second_rejection_is_authentication_error() {
    let (url, api) = fake_node(usize::MAX).await;
    let client = authenticated(&url).await;

    let err = client
        .eth_keys(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Authentication(_)));

    let api = api.lock().unwrap();
    assert_eq!(api.sessions, 2);
    assert_eq!(api.requests, 2);
}

#[tokio::test]
async fn import_password_is_query_encoded() {
    let (url, api) = fake_node(0).await;
    let client = authenticated(&url).await;
    let password = "a b&c=d?é!";

    let address = client
        .import_eth_key(&CancellationToken::new(), &json!({ "crypto": {} }), password)
        .await
        .unwrap();
    assert_eq!(address, KEY);
    assert_eq!(api.lock().unwrap().import_password.as_deref(), Some(password));
}
