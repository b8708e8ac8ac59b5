//! The wired node runtime against a mock agent admin API.

use super::harness::{post_json, request, WEBHOOK_PATH};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use node_runtime::{AgencyConfig, AgencyContainer};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use uuid::Uuid;

const RESOLVED_CRED_DEF: &str = "Issuer:3:CL:20:default";

/// Admin API state of the mock agent.
#[derive(Clone, Default)]
struct MockAgent {
    readiness_polls: Arc<AtomicUsize>,
    cred_def_lookups: Arc<AtomicUsize>,
    offers: Arc<Mutex<Vec<Value>>>,
    reject_offers: bool,
    /// Router of the agency under test; webhooks are posted here.
    agency: Arc<OnceLock<Router>>,
}

async fn status_ready(State(agent): State<MockAgent>) -> Json<Value> {
    // Not ready for the first two polls.
    let polls = agent.readiness_polls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "ready": polls >= 2 }))
}

async fn created_cred_defs(State(agent): State<MockAgent>) -> Json<Value> {
    agent.cred_def_lookups.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(30)).await;
    Json(json!({ "credential_definition_ids": [RESOLVED_CRED_DEF] }))
}

async fn send_offer(
    State(agent): State<MockAgent>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    agent.offers.lock().push(body);
    if agent.reject_offers {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": "connection not active" })),
        );
    }

    let cred_ex_id = Uuid::new_v4().to_string();
    let id = cred_ex_id.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        if let Some(router) = agent.agency.get() {
            post_json(
                router,
                WEBHOOK_PATH,
                &json!({ "cred_ex_id": id, "state": "credential_acked" }),
            )
            .await;
        }
    });
    (
        StatusCode::OK,
        Json(json!({ "cred_ex_id": cred_ex_id, "state": "offer-sent" })),
    )
}

async fn start_mock(agent: MockAgent) -> String {
    let router = Router::new()
        .route("/status/ready", get(status_ready))
        .route("/credential-definitions/created", get(created_cred_defs))
        .route("/issue-credential-2.0/send-offer", post(send_offer))
        .with_state(agent);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn profile_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let profile = json!({
        "name": "bc-registries",
        "did": "did:sov:Issuer",
        "vcr": { "connection_id": "vcr-conn" },
        "schemas": [
            {
                "schema_id": "Issuer:2:Passport:1.0",
                "schema_name": "Passport",
                "schema_version": "1.0",
                "credential_definition_id": "Issuer:3:CL:10:default"
            },
            {
                "schema_id": "Issuer:2:Licence:2.0",
                "schema_name": "Licence",
                "schema_version": "2.0"
            }
        ]
    });
    write!(file, "{profile}").unwrap();
    file
}

fn config(admin_url: String, profile: &tempfile::NamedTempFile) -> AgencyConfig {
    let mut config = AgencyConfig::default();
    config.agent.client.admin_url = admin_url;
    config.agent.readiness_poll_interval = Duration::from_millis(20);
    config.agent.cred_ex_timeout = Duration::from_secs(5);
    config.issuer.profile_path = Some(profile.path().to_path_buf());
    config
}

/// Wait for readiness, start the correlator and publish the gateway router
/// to the mock agent.
async fn boot(container: &AgencyContainer, agent: &MockAgent) -> (Router, watch::Sender<bool>) {
    let report = container.readiness_gate().wait().await;
    assert_eq!(report.attempts, 3);

    let (shutdown, shutdown_rx) = watch::channel(false);
    let _ = container.spawn_correlator(shutdown_rx);

    let router = container.gateway().unwrap().router();
    let _ = agent.agency.set(router.clone());
    (router, shutdown)
}

#[tokio::test]
async fn test_agency_issues_batch_end_to_end() {
    let agent = MockAgent::default();
    let admin_url = start_mock(agent.clone()).await;
    let profile = profile_file();
    let container = AgencyContainer::new(config(admin_url, &profile)).unwrap();
    let (router, shutdown) = boot(&container, &agent).await;

    let (status, body) = post_json(
        &router,
        "/issuer/credentials",
        &json!([
            request("Passport", "1.0", json!({ "name": "Alice" })),
            request("Licence", "2.0", json!({ "holder": "Bob" })),
            request("Licence", "2.0", json!({ "holder": "Carol" })),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let outcomes = body.as_array().unwrap();
    assert_eq!(outcomes.len(), 3);
    for (order, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome["order"], order);
        assert_eq!(outcome["outcome"], "succeeded", "{outcome}");
        assert_eq!(outcome["payload"]["state"], "credential_acked");
    }

    // Both Licence items needed the same missing credential definition.
    assert_eq!(agent.cred_def_lookups.load(Ordering::SeqCst), 1);
    assert_eq!(
        container
            .ledger
            .cached_credential_definition("Issuer:2:Licence:2.0")
            .as_deref(),
        Some(RESOLVED_CRED_DEF)
    );

    let offers = agent.offers.lock();
    assert_eq!(offers.len(), 3);
    let mut cred_defs: Vec<&str> = offers
        .iter()
        .map(|offer| offer["filter"]["indy"]["cred_def_id"].as_str().unwrap())
        .collect();
    cred_defs.sort_unstable();
    assert_eq!(
        cred_defs,
        vec!["Issuer:3:CL:10:default", RESOLVED_CRED_DEF, RESOLVED_CRED_DEF]
    );
    assert!(offers
        .iter()
        .all(|offer| offer["connection_id"] == "vcr-conn"));
    drop(offers);

    let stats = container.correlator.stats();
    assert_eq!(stats.resolved, 3);
    assert_eq!(stats.timed_out, 0);

    shutdown.send(true).unwrap();
}

#[tokio::test]
async fn test_agency_reports_rejected_offer_with_upstream_details() {
    let agent = MockAgent {
        reject_offers: true,
        ..Default::default()
    };
    let admin_url = start_mock(agent.clone()).await;
    let profile = profile_file();
    let container = AgencyContainer::new(config(admin_url, &profile)).unwrap();
    let (router, shutdown) = boot(&container, &agent).await;

    let (status, body) = post_json(
        &router,
        "/issuer/credentials",
        &request("Passport", "1.0", json!({ "name": "Dave" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "failed");
    assert_eq!(body["kind"], "dispatch_error");
    assert_eq!(body["status"], 422);
    assert_eq!(body["body"]["detail"], "connection not active");
    assert_eq!(container.correlator.stats().registered, 0);

    shutdown.send(true).unwrap();
}

#[tokio::test]
async fn test_agency_runs_agent_operations() {
    let agent = MockAgent::default();
    let admin_url = start_mock(agent.clone()).await;
    let profile = profile_file();
    let container = AgencyContainer::new(config(admin_url, &profile)).unwrap();
    let (router, shutdown) = boot(&container, &agent).await;

    let (status, body) = post_json(
        &router,
        "/agent/operations",
        &json!({
            "service": "cred_def",
            "action": "details",
            "data": { "schema_id": "Issuer:2:Licence:2.0" }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(RESOLVED_CRED_DEF));
    assert_eq!(agent.cred_def_lookups.load(Ordering::SeqCst), 1);

    let (status, body) = post_json(
        &router,
        "/agent/operations",
        &json!({ "service": "wallet", "action": "list" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "unsupported_operation");

    shutdown.send(true).unwrap();
}
