//! Bring-up against an in-memory container engine and an in-process fake
//! node API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::Address;
use automation_core::types::{Environment, NodeConfig};
use automation_node::orchestrator::{
    container_name, db_container_name, BringUp, NodeRole, Orchestrator, OrchestratorSettings,
};
use automation_node::{FakeEngine, NodeError};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

const PEER_ID: &str = "12D3KooWfake";
const SESSION: &str = "clsession=fake-session";

#[derive(Default)]
struct NodeApi {
    eth_keys: Vec<Address>,
    imported: Vec<(String, Value)>,
    jobs: Vec<(String, String)>,
    sessions: usize,
}

type Shared = Arc<Mutex<NodeApi>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(SESSION))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "errors": [{ "detail": "Unauthorized" }] })),
    )
        .into_response()
}

async fn sessions(State(api): State<Shared>, Json(body): Json<Value>) -> Response {
    if body["password"].as_str() != Some(automation_core::DEFAULT_NODE_PASSWORD) {
        return unauthorized();
    }
    api.lock().unwrap().sessions += 1;
    (
        [(header::SET_COOKIE, format!("{SESSION}; Path=/; HttpOnly"))],
        Json(json!({ "data": { "id": "session", "attributes": {} } })),
    )
        .into_response()
}

async fn eth_keys(State(api): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let keys = api.lock().unwrap().eth_keys.clone();
    let data: Vec<Value> = keys
        .iter()
        .map(|a| json!({ "id": a.to_string(), "attributes": { "address": a.to_string() } }))
        .collect();
    Json(json!({ "data": data })).into_response()
}

async fn import_key(
    State(api): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(keystore): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let imported = Address::repeat_byte(0x77);
    let mut api = api.lock().unwrap();
    api.imported
        .push((query.get("oldpassword").cloned().unwrap_or_default(), keystore));
    api.eth_keys.insert(0, imported);
    Json(json!({ "data": { "id": imported.to_string(), "attributes": { "address": imported.to_string() } } }))
        .into_response()
}

async fn p2p_keys(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "data": [{ "id": "p2p", "attributes": { "peerId": format!("p2p_{PEER_ID}") } }] }))
        .into_response()
}

async fn ocr2_keys(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "data": [{
        "id": "bundle-1",
        "attributes": {
            "chainType": "evm",
            "onchainPublicKey": "ocr2on_evm_1111111111111111111111111111111111111111",
            "offchainPublicKey": "ocr2off_evm_2222",
            "configPublicKey": "ocr2cfg_evm_3333",
        }
    }] }))
    .into_response()
}

async fn list_jobs(State(api): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let jobs = api.lock().unwrap().jobs.clone();
    let data: Vec<Value> = jobs
        .iter()
        .enumerate()
        .map(|(i, (job_type, contract))| {
            let spec_key = if job_type == "bootstrap" {
                "bootstrapSpec"
            } else {
                "offChainReporting2OracleSpec"
            };
            json!({ "id": i.to_string(), "attributes": { "type": job_type, (spec_key): { "contractID": contract } } })
        })
        .collect();
    Json(json!({ "data": data })).into_response()
}

async fn create_job(
    State(api): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let spec: toml::Table = match body["toml"].as_str().map(str::parse) {
        Some(Ok(spec)) => spec,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "errors": [{ "detail": "invalid job spec" }] })),
            )
                .into_response();
        }
    };
    let job_type = spec["type"].as_str().unwrap_or_default().to_string();
    let contract = spec["contractID"].as_str().unwrap_or_default().to_string();
    let mut api = api.lock().unwrap();
    api.jobs.push((job_type, contract));
    let id = api.jobs.len().to_string();
    Json(json!({ "data": { "id": id, "attributes": {} } })).into_response()
}

/// Start a fake node API; returns its port and state.
async fn fake_node(keys: Vec<Address>) -> (u16, Shared) {
    let api: Shared = Arc::new(Mutex::new(NodeApi {
        eth_keys: keys,
        ..Default::default()
    }));
    let router = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/sessions", post(sessions))
        .route("/v2/keys/evm", get(eth_keys))
        .route("/v2/keys/evm/import", post(import_key))
        .route("/v2/keys/p2p", get(p2p_keys))
        .route("/v2/keys/ocr2", get(ocr2_keys))
        .route("/v2/jobs", get(list_jobs).post(create_job))
        .with_state(api.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (port, api)
}

struct Harness {
    engine: FakeEngine,
    orchestrator: Orchestrator,
    state_dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let mut env = Environment::default();
    env.group_name = "automation".to_string();
    env.chain_id = 1337;
    env.ws_url = "ws://chain:8546".to_string();
    env.http_url = "http://chain:8545".to_string();
    let mut settings = OrchestratorSettings::from_environment(&env);
    settings.host = "127.0.0.1".to_string();
    settings.health_interval = Duration::from_millis(10);
    settings.health_timeout = Duration::from_secs(5);
    settings.db_grace_period = Duration::ZERO;

    let engine = FakeEngine::new();
    Harness {
        orchestrator: Orchestrator::new(Arc::new(engine.clone()), settings),
        engine,
        state_dir: tempfile::tempdir().unwrap(),
    }
}

impl Harness {
    fn request(&self, node: NodeConfig, role: NodeRole, reset: bool) -> BringUp {
        BringUp {
            node_dir: self.state_dir.path().join(&node.name),
            node,
            role,
            registry: Address::repeat_byte(0xaa),
            reset,
        }
    }

    fn ids(&self, node: &str) -> (String, String) {
        let db = self
            .engine
            .container_named(&db_container_name("automation", node))
            .unwrap();
        let main = self
            .engine
            .container_named(&container_name("automation", node))
            .unwrap();
        (db.id, main.id)
    }
}

fn bootstrap(port: u16) -> NodeConfig {
    NodeConfig::new("bootstrap", "smartcontract/chainlink:2.6.0", "info", port)
}

fn participant(port: u16) -> NodeConfig {
    NodeConfig::new("participant-0", "smartcontract/chainlink:2.6.0", "info", port)
}

fn participant_role(private_key: Option<&str>) -> NodeRole {
    NodeRole::Participant {
        bootstrapper: format!("{PEER_ID}@automation-bootstrap:8000"),
        private_key: private_key.map(str::to_string),
    }
}

#[tokio::test]
async fn bootstrap_bring_up_creates_pair_and_job() {
    let h = harness();
    let (port, api) = fake_node(vec![]).await;
    let cancel = CancellationToken::new();

    let node = h
        .orchestrator
        .bring_up(&cancel, h.request(bootstrap(port), NodeRole::Bootstrap, false))
        .await
        .unwrap();

    assert_eq!(node.p2p_key_id.as_deref(), Some(PEER_ID));
    assert_eq!(node.url, Some(format!("http://127.0.0.1:{port}")));

    let calls = h.engine.calls();
    assert_eq!(calls[0], "pull postgres:latest");
    assert_eq!(calls[1], "network automation-local");
    assert!(calls.contains(&"create automation-bootstrap-postgres".to_string()));
    assert!(calls.contains(&"create automation-bootstrap".to_string()));

    let db = h
        .engine
        .container_named("automation-bootstrap-postgres")
        .unwrap();
    assert!(db.running);
    assert_eq!(db.spec.aliases, vec!["automation-bootstrap-postgres".to_string()]);

    let main = h.engine.container_named("automation-bootstrap").unwrap();
    assert!(main.running);
    assert_eq!(main.spec.ports[0].host_port, port);
    assert!(h
        .state_dir
        .path()
        .join("bootstrap/secrets/01-config.toml")
        .exists());

    let api = api.lock().unwrap();
    assert_eq!(api.sessions, 1);
    assert_eq!(api.jobs.len(), 1);
    assert_eq!(api.jobs[0].0, "bootstrap");
}

#[tokio::test]
async fn second_bring_up_without_reset_is_idempotent() {
    let h = harness();
    let (port, api) = fake_node(vec![]).await;
    let cancel = CancellationToken::new();

    h.orchestrator
        .bring_up(&cancel, h.request(bootstrap(port), NodeRole::Bootstrap, false))
        .await
        .unwrap();
    let first = h.ids("bootstrap");
    h.engine.clear_calls();

    h.orchestrator
        .bring_up(&cancel, h.request(bootstrap(port), NodeRole::Bootstrap, false))
        .await
        .unwrap();
    assert_eq!(h.ids("bootstrap"), first);
    assert!(h
        .engine
        .calls()
        .iter()
        .all(|c| !c.starts_with("create") && !c.starts_with("remove")));

    // The job is already installed for this registry.
    assert_eq!(api.lock().unwrap().jobs.len(), 1);
}

#[tokio::test]
async fn reset_recreates_containers() {
    let h = harness();
    let (port, _api) = fake_node(vec![]).await;
    let cancel = CancellationToken::new();

    h.orchestrator
        .bring_up(&cancel, h.request(bootstrap(port), NodeRole::Bootstrap, false))
        .await
        .unwrap();
    let (old_db, old_main) = h.ids("bootstrap");

    h.orchestrator
        .bring_up(&cancel, h.request(bootstrap(port), NodeRole::Bootstrap, true))
        .await
        .unwrap();
    let (new_db, new_main) = h.ids("bootstrap");
    assert_ne!(old_db, new_db);
    assert_ne!(old_main, new_main);
    assert!(h.engine.calls().contains(&format!("remove {old_main}")));
}

#[tokio::test]
async fn image_change_needs_reset() {
    let h = harness();
    let (port, _api) = fake_node(vec![]).await;
    let cancel = CancellationToken::new();

    h.orchestrator
        .bring_up(&cancel, h.request(bootstrap(port), NodeRole::Bootstrap, false))
        .await
        .unwrap();
    let ids = h.ids("bootstrap");

    let mut upgraded = bootstrap(port);
    upgraded.image = "smartcontract/chainlink:2.7.0".to_string();
    h.orchestrator
        .bring_up(&cancel, h.request(upgraded.clone(), NodeRole::Bootstrap, false))
        .await
        .unwrap();
    assert_eq!(h.ids("bootstrap"), ids);
    let state = h.orchestrator.inspect(&cancel, "bootstrap").await.unwrap();
    assert_eq!(
        state.main.stale_image(&upgraded.image),
        Some("smartcontract/chainlink:2.6.0")
    );

    h.orchestrator
        .bring_up(&cancel, h.request(upgraded.clone(), NodeRole::Bootstrap, true))
        .await
        .unwrap();
    let state = h.orchestrator.inspect(&cancel, "bootstrap").await.unwrap();
    assert_eq!(state.main.stale_image(&upgraded.image), None);
    assert_eq!(state.main.image.as_deref(), Some(upgraded.image.as_str()));
}

#[tokio::test]
async fn stopped_node_is_restarted_not_recreated() {
    let h = harness();
    let (port, _api) = fake_node(vec![]).await;
    let cancel = CancellationToken::new();

    h.orchestrator
        .bring_up(&cancel, h.request(bootstrap(port), NodeRole::Bootstrap, false))
        .await
        .unwrap();
    let ids = h.ids("bootstrap");
    h.engine.stop("automation-bootstrap");
    h.engine.clear_calls();

    h.orchestrator
        .bring_up(&cancel, h.request(bootstrap(port), NodeRole::Bootstrap, false))
        .await
        .unwrap();
    assert_eq!(h.ids("bootstrap"), ids);
    assert!(h.engine.calls().contains(&format!("start {}", ids.1)));
    assert!(h.engine.container_named("automation-bootstrap").unwrap().running);
}

#[tokio::test]
async fn participant_imports_key_and_installs_job() {
    let h = harness();
    let (port, api) = fake_node(vec![]).await;
    let cancel = CancellationToken::new();
    let key = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    let node = h
        .orchestrator
        .bring_up(&cancel, h.request(participant(port), participant_role(Some(key)), false))
        .await
        .unwrap();

    assert_eq!(node.address, Some(Address::repeat_byte(0x77)));
    let ocr = node.ocr.unwrap();
    assert_eq!(ocr.bundle_id, "bundle-1");
    assert_eq!(node.p2p_key_id.as_deref(), Some(PEER_ID));

    let api = api.lock().unwrap();
    assert_eq!(api.imported.len(), 1);
    assert_eq!(api.imported[0].0, automation_core::DEFAULT_NODE_PASSWORD);
    assert!(api.imported[0].1.get("crypto").is_some());
    assert_eq!(api.jobs.len(), 1);
    assert_eq!(api.jobs[0].0, "offchainreporting2");
    assert_eq!(
        api.jobs[0].1.parse::<Address>().unwrap(),
        Address::repeat_byte(0xaa)
    );
}

#[tokio::test]
async fn participant_without_key_adopts_first_node_key() {
    let h = harness();
    let existing = Address::repeat_byte(0x42);
    let (port, api) = fake_node(vec![existing, Address::repeat_byte(0x43)]).await;
    let cancel = CancellationToken::new();

    let node = h
        .orchestrator
        .bring_up(&cancel, h.request(participant(port), participant_role(None), false))
        .await
        .unwrap();

    assert_eq!(node.address, Some(existing));
    assert!(api.lock().unwrap().imported.is_empty());
}

#[tokio::test]
async fn participant_without_any_key_fails() {
    let h = harness();
    let (port, _api) = fake_node(vec![]).await;
    let cancel = CancellationToken::new();

    let err = h
        .orchestrator
        .bring_up(&cancel, h.request(participant(port), participant_role(None), false))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Key(_)));
}

#[tokio::test]
async fn wrong_password_is_authentication_error() {
    let h = harness();
    let (port, _api) = fake_node(vec![]).await;
    let cancel = CancellationToken::new();
    let mut node = bootstrap(port);
    node.password = "wrong".to_string();

    let err = h
        .orchestrator
        .bring_up(&cancel, h.request(node, NodeRole::Bootstrap, false))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Authentication(_)));
}

#[tokio::test]
async fn remove_deletes_both_containers() {
    let h = harness();
    let (port, _api) = fake_node(vec![]).await;
    let cancel = CancellationToken::new();

    h.orchestrator
        .bring_up(&cancel, h.request(bootstrap(port), NodeRole::Bootstrap, false))
        .await
        .unwrap();
    h.orchestrator.remove(&cancel, "bootstrap").await.unwrap();

    assert!(h.engine.containers().is_empty());
    let state = h.orchestrator.inspect(&cancel, "bootstrap").await.unwrap();
    assert_eq!(state.vector(), (false, false, false, false));
}

#[tokio::test]
async fn cancelled_bring_up_stops_early() {
    let h = harness();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .orchestrator
        .bring_up(&cancel, h.request(bootstrap(1), NodeRole::Bootstrap, false))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Cancelled));
    assert!(h.engine.calls().is_empty());
}
