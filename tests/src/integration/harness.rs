//! Simulated agent and wiring shared by the flows.
//!
//! The simulated agent accepts every offer with a fresh `cred_ex_id` and
//! reports the result later by posting webhooks into the gateway router,
//! the same path a real agent takes. Per-request behaviour is read from the
//! credential attributes:
//!
//! | Attribute | Effect |
//! |-----------|--------|
//! | `delay_ms` | wait before the terminal webhook (default 20) |
//! | `final_state` | state of the terminal webhook (default `done`) |
//! | `progress` | send a `credential-issued` webhook first |
//! | `silent` | never report back |

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ia_03_event_correlator::{CorrelatorConfig, EventCorrelator};
use ia_04_batch_orchestrator::{
    BatchOrchestrator, CredDefResolver, CredentialDispatcher, CredentialOffer, IssuanceApi,
    OrchestratorConfig, UpstreamFailure,
};
use ia_06_api_gateway::{ApiGatewayService, GatewayConfig};
use parking_lot::Mutex;
use serde_json::{json, Value};
use shared_bus::{EventFilter, EventPublisher, EventTopic, InMemoryEventBus};
use shared_types::{IssuerProfile, RegistryConnection, SchemaRecord};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use tower::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_PATH: &str = "/webhooks/topic/issue_credential_v2_0";

pub fn profile() -> IssuerProfile {
    IssuerProfile {
        name: "bc-registries".into(),
        did: "did:sov:Issuer".into(),
        wallet: None,
        vcr: Some(RegistryConnection {
            connection_id: "vcr-conn".into(),
        }),
        schemas: vec![
            SchemaRecord {
                schema_id: "Issuer:2:Passport:1.0".into(),
                schema_name: "Passport".into(),
                schema_version: "1.0".into(),
                credential_definition_id: Some("Issuer:3:CL:1:default".into()),
                attributes: vec!["name".into()],
            },
            SchemaRecord {
                schema_id: "Issuer:2:Licence:2.0".into(),
                schema_name: "Licence".into(),
                schema_version: "2.0".into(),
                credential_definition_id: Some("Issuer:3:CL:2:default".into()),
                attributes: vec!["holder".into()],
            },
        ],
    }
}

/// Post `body` to `path` on `router` and return status and parsed JSON.
pub async fn post_json(router: &Router, path: &str, body: &Value) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::post(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn attribute<'a>(offer: &'a CredentialOffer, name: &str) -> Option<&'a str> {
    offer
        .credential_preview
        .attributes
        .iter()
        .find(|attr| attr.name == name)
        .map(|attr| attr.value.as_str())
}

/// Agent stand-in that completes exchanges through the gateway's webhook
/// route.
pub struct SimulatedAgent {
    router: Arc<OnceLock<Router>>,
    pub offers: Mutex<Vec<CredentialOffer>>,
}

impl SimulatedAgent {
    pub fn new(router: Arc<OnceLock<Router>>) -> Self {
        Self {
            router,
            offers: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CredentialDispatcher for SimulatedAgent {
    async fn send_offer(
        &self,
        offer: &CredentialOffer,
        _wallet_token: Option<&str>,
    ) -> Result<Value, UpstreamFailure> {
        self.offers.lock().push(offer.clone());

        let cred_ex_id = Uuid::new_v4().to_string();
        let delay = attribute(offer, "delay_ms")
            .and_then(|ms| ms.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(20));
        let final_state = attribute(offer, "final_state").unwrap_or("done").to_string();
        let progress = attribute(offer, "progress").is_some();
        let silent = attribute(offer, "silent").is_some();

        if !silent {
            let router = Arc::clone(&self.router);
            let id = cred_ex_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let Some(router) = router.get() else { return };
                if progress {
                    post_json(
                        router,
                        WEBHOOK_PATH,
                        &json!({ "cred_ex_id": id, "state": "credential-issued" }),
                    )
                    .await;
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                post_json(
                    router,
                    WEBHOOK_PATH,
                    &json!({ "cred_ex_id": id, "state": final_state }),
                )
                .await;
            });
        }

        Ok(json!({ "cred_ex_id": cred_ex_id, "state": "offer-sent" }))
    }
}

/// Every schema in the test profile carries a credential definition.
pub struct NoResolution;

#[async_trait]
impl CredDefResolver for NoResolution {
    async fn resolve_cred_def(&self, schema: &SchemaRecord) -> Result<String, UpstreamFailure> {
        Err(UpstreamFailure::new(format!(
            "unexpected resolution for {}",
            schema.schema_id
        )))
    }
}

/// Gateway, bus, correlator and orchestrator wired together around a
/// simulated agent.
pub struct Harness {
    pub router: Router,
    pub agent: Arc<SimulatedAgent>,
    pub bus: Arc<InMemoryEventBus>,
    pub correlator: EventCorrelator,
    shutdown: watch::Sender<bool>,
}

impl Harness {
    pub fn start(cred_ex_timeout: Duration) -> Self {
        let slot = Arc::new(OnceLock::new());
        let agent = Arc::new(SimulatedAgent::new(Arc::clone(&slot)));
        let bus = Arc::new(InMemoryEventBus::new());
        let correlator = EventCorrelator::new(CorrelatorConfig::default());

        let orchestrator: Arc<dyn IssuanceApi> = Arc::new(BatchOrchestrator::new(
            Arc::clone(&agent),
            Arc::new(NoResolution),
            correlator.clone(),
            OrchestratorConfig { cred_ex_timeout },
        ));
        let events: Arc<dyn EventPublisher> = bus.clone();
        let gateway = ApiGatewayService::new(
            GatewayConfig::default(),
            orchestrator,
            Arc::new(profile()),
            events,
        )
        .unwrap();
        let router = gateway.router();
        let _ = slot.set(router.clone());

        let (shutdown, shutdown_rx) = watch::channel(false);
        let subscription = bus.subscribe(EventFilter::topics(vec![EventTopic::IssueCredential]));
        let runner = correlator.clone();
        tokio::spawn(async move { runner.run(subscription, shutdown_rx).await });

        Self {
            router,
            agent,
            bus,
            correlator,
            shutdown,
        }
    }

    pub async fn issue(&self, body: Value) -> (StatusCode, Value) {
        post_json(&self.router, "/issuer/credentials", &body).await
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

pub fn request(schema: &str, version: &str, attributes: Value) -> Value {
    json!({
        "schema_name": schema,
        "schema_version": version,
        "attributes": attributes,
    })
}
