//! Batch Orchestrator service.
//!
//! Per item:
//!
//! ```text
//! Pending ──schema/cred def──→ Dispatched ──cred_ex_id──→ AwaitingEvent ──→ Settled
//!    │                              │                                        ▲
//!    └──────── validation or dispatch failure ─────────────────────────────┘
//! ```
//!
//! All items of a batch run concurrently in the caller's task and are joined
//! once; nothing one item does can change another item's outcome.

use crate::config::OrchestratorConfig;
use crate::domain::{
    format_offer, FailureKind, IssuanceInput, IssuanceOutcome, IssuanceResponse, RequestItem,
};
use crate::error::OrchestratorResult;
use crate::ports::inbound::IssuanceApi;
use crate::ports::outbound::{CredDefResolver, CredentialDispatcher};
use async_trait::async_trait;
use futures::future::join_all;
use ia_03_event_correlator::{CorrelationError, EventCorrelator};
use shared_types::{CorrelationId, IssuerProfile};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Issues credentials through the agent and waits for each exchange to
/// finish.
pub struct BatchOrchestrator<D, R> {
    dispatcher: Arc<D>,
    resolver: Arc<R>,
    correlator: EventCorrelator,
    config: OrchestratorConfig,
}

impl<D, R> BatchOrchestrator<D, R>
where
    D: CredentialDispatcher,
    R: CredDefResolver,
{
    pub fn new(
        dispatcher: Arc<D>,
        resolver: Arc<R>,
        correlator: EventCorrelator,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            dispatcher,
            resolver,
            correlator,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Parse `body` and issue it. Only unreadable input is an error.
    pub async fn issue_json(
        &self,
        body: serde_json::Value,
        profile: &IssuerProfile,
    ) -> OrchestratorResult<IssuanceResponse> {
        let input = IssuanceInput::from_json(body)?;
        Ok(self.issue_input(input, profile).await)
    }

    /// Issue a parsed input. The response has the same shape as the input.
    pub async fn issue_input(&self, input: IssuanceInput, profile: &IssuerProfile) -> IssuanceResponse {
        match input {
            IssuanceInput::Single(item) => {
                IssuanceResponse::Single(self.issue_one(item, profile).await)
            }
            IssuanceInput::Batch(items) => {
                let started = Instant::now();
                let count = items.len();
                info!(items = count, issuer = %profile.name, "Issuing credential batch");

                let mut outcomes =
                    join_all(items.into_iter().map(|item| self.issue_one(item, profile))).await;
                outcomes.sort_by_key(|outcome| outcome.order);

                let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
                info!(
                    items = count,
                    succeeded,
                    failed = count - succeeded,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Credential batch settled"
                );
                IssuanceResponse::Batch(outcomes)
            }
        }
    }

    /// Issue one credential and await its terminal exchange event.
    ///
    /// The wait is registered only once `send_offer` has returned the
    /// `cred_ex_id`. A terminal webhook the agent posts before that reply
    /// arrives finds no waiter and is dropped as unmatched, so the item
    /// reports a timeout.
    async fn issue_one(&self, item: RequestItem, profile: &IssuerProfile) -> IssuanceOutcome {
        let request = match item {
            Ok(request) => request,
            Err(rejected) => {
                return IssuanceOutcome::failed(
                    rejected.order,
                    FailureKind::ValidationError,
                    rejected.reason,
                )
            }
        };
        let order = request.order;

        let Some(schema) = profile.find_schema(&request.schema_name, &request.schema_version)
        else {
            debug!(
                order,
                schema_name = %request.schema_name,
                schema_version = %request.schema_version,
                "Unknown schema"
            );
            return IssuanceOutcome::failed(
                order,
                FailureKind::ValidationError,
                format!(
                    "schema {} with version {} does not exist",
                    request.schema_name, request.schema_version
                ),
            );
        };

        let cred_def_id = match schema.cred_def_id() {
            Some(id) => id.to_string(),
            None => match self.resolver.resolve_cred_def(schema).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(order, schema_id = %schema.schema_id, error = %e, "Credential definition unavailable");
                    return IssuanceOutcome::failed(
                        order,
                        FailureKind::DispatchError,
                        format!(
                            "no credential definition for schema {}: {}",
                            schema.schema_id, e.message
                        ),
                    )
                    .with_upstream(e.status, e.body);
                }
            },
        };

        let offer = match format_offer(profile, schema, &cred_def_id, &request.attributes) {
            Ok(offer) => offer,
            Err(attribute) => {
                return IssuanceOutcome::failed(
                    order,
                    FailureKind::ValidationError,
                    format!("attribute {attribute} has no value"),
                )
            }
        };

        let response = match self
            .dispatcher
            .send_offer(&offer, profile.wallet_token())
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(order, status = ?e.status, error = %e, "Credential offer rejected");
                return IssuanceOutcome::failed(order, FailureKind::DispatchError, e.message)
                    .with_upstream(e.status, e.body);
            }
        };

        let Some(cred_ex_id) = CorrelationId::from_field(&response, "cred_ex_id") else {
            warn!(order, "Agent accepted offer without a cred_ex_id");
            return IssuanceOutcome::failed(
                order,
                FailureKind::InternalConsistencyError,
                "agent accepted the offer but returned no cred_ex_id",
            )
            .with_upstream(None, Some(response));
        };

        let wait = match self.correlator.register(
            cred_ex_id.clone(),
            Some(order),
            self.config.cred_ex_timeout,
        ) {
            Ok(wait) => wait,
            Err(e) => {
                return IssuanceOutcome::failed(
                    order,
                    FailureKind::InternalConsistencyError,
                    e.to_string(),
                )
            }
        };
        debug!(order, cred_ex_id = %cred_ex_id, "Awaiting credential exchange");

        match wait.wait(|event| event).await {
            Ok(event) => match event.failure_detail() {
                Some(detail) => {
                    warn!(order, cred_ex_id = %cred_ex_id, state = %event.state, "Agent reported exchange failure");
                    IssuanceOutcome::failed(order, FailureKind::AgentReportedError, detail)
                        .with_upstream(None, Some(event.payload))
                }
                None => {
                    debug!(order, cred_ex_id = %cred_ex_id, "Credential issued");
                    IssuanceOutcome::succeeded(order, event.payload)
                }
            },
            Err(CorrelationError::TimedOut { timeout, .. }) => IssuanceOutcome::failed(
                order,
                FailureKind::TimeoutError,
                format!("credential exchange {cred_ex_id} did not complete within {timeout:?}"),
            ),
            Err(e) => {
                IssuanceOutcome::failed(order, FailureKind::InternalConsistencyError, e.to_string())
            }
        }
    }
}

#[async_trait]
impl<D, R> IssuanceApi for BatchOrchestrator<D, R>
where
    D: CredentialDispatcher,
    R: CredDefResolver,
{
    async fn issue(&self, input: IssuanceInput, profile: &IssuerProfile) -> IssuanceResponse {
        self.issue_input(input, profile).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CredentialOffer, OutcomeStatus};
    use crate::error::OrchestratorError;
    use crate::ports::outbound::UpstreamFailure;
    use ia_03_event_correlator::CorrelatorConfig;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use shared_bus::{AgentEvent, EventState, EventTopic};
    use shared_types::{RegistryConnection, SchemaRecord};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// How the mock agent treats offers for a schema.
    #[derive(Clone)]
    enum Behaviour {
        /// Accept and emit a terminal event after `delay`.
        Complete { delay: Duration, state: &'static str },
        /// Report completion before answering the offer call.
        CompleteBeforeReply,
        /// Accept and never report back.
        Silent,
        /// Refuse the offer.
        Reject { status: u16 },
        /// Accept without an exchange id.
        NoExchangeId,
    }

    struct MockAgent {
        correlator: EventCorrelator,
        behaviour: HashMap<String, Behaviour>,
        next_id: AtomicUsize,
        offers: Mutex<Vec<CredentialOffer>>,
    }

    impl MockAgent {
        fn new(correlator: EventCorrelator) -> Self {
            Self {
                correlator,
                behaviour: HashMap::new(),
                next_id: AtomicUsize::new(0),
                offers: Mutex::new(Vec::new()),
            }
        }

        fn on(mut self, schema_name: &str, behaviour: Behaviour) -> Self {
            self.behaviour.insert(schema_name.to_string(), behaviour);
            self
        }
    }

    #[async_trait]
    impl CredentialDispatcher for MockAgent {
        async fn send_offer(
            &self,
            offer: &CredentialOffer,
            _wallet_token: Option<&str>,
        ) -> Result<Value, UpstreamFailure> {
            self.offers.lock().push(offer.clone());
            let behaviour = self
                .behaviour
                .get(&offer.filter.indy.schema_name)
                .cloned()
                .unwrap_or(Behaviour::Complete {
                    delay: Duration::from_millis(5),
                    state: "done",
                });
            let cred_ex_id = format!("cx-{}", self.next_id.fetch_add(1, Ordering::SeqCst));

            match behaviour {
                Behaviour::Complete { delay, state } => {
                    let correlator = self.correlator.clone();
                    let id = cred_ex_id.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        correlator.deliver(AgentEvent::new(
                            EventTopic::IssueCredential,
                            id.as_str(),
                            EventState::parse(state),
                            json!({ "cred_ex_id": id, "state": state }),
                        ));
                    });
                    Ok(json!({ "cred_ex_id": cred_ex_id, "state": "offer-sent" }))
                }
                Behaviour::CompleteBeforeReply => {
                    self.correlator.deliver(AgentEvent::new(
                        EventTopic::IssueCredential,
                        cred_ex_id.as_str(),
                        EventState::parse("done"),
                        json!({ "cred_ex_id": cred_ex_id, "state": "done" }),
                    ));
                    Ok(json!({ "cred_ex_id": cred_ex_id, "state": "offer-sent" }))
                }
                Behaviour::Silent => Ok(json!({ "cred_ex_id": cred_ex_id })),
                Behaviour::Reject { status } => Err(UpstreamFailure::new("Bad Request")
                    .with_response(status, Some(json!({ "reason": "connection not ready" })))),
                Behaviour::NoExchangeId => Ok(json!({ "state": "offer-sent" })),
            }
        }
    }

    struct MockResolver {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CredDefResolver for MockResolver {
        async fn resolve_cred_def(&self, schema: &SchemaRecord) -> Result<String, UpstreamFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(UpstreamFailure::new("ledger unavailable").with_response(503, None));
            }
            Ok(format!("{}:CD", schema.schema_id))
        }
    }

    fn resolver(fail: bool) -> Arc<MockResolver> {
        Arc::new(MockResolver {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn schema(name: &str, version: &str, cred_def: Option<&str>) -> SchemaRecord {
        SchemaRecord {
            schema_id: format!("S:{name}:{version}"),
            schema_name: name.into(),
            schema_version: version.into(),
            credential_definition_id: cred_def.map(str::to_string),
            attributes: vec!["name".into()],
        }
    }

    fn profile(schemas: Vec<SchemaRecord>) -> IssuerProfile {
        IssuerProfile {
            name: "Test Issuer".into(),
            did: "did:sov:issuer".into(),
            wallet: None,
            vcr: Some(RegistryConnection {
                connection_id: "conn-vcr".into(),
            }),
            schemas,
        }
    }

    fn request(name: &str, version: &str) -> Value {
        json!({ "schema_name": name, "schema_version": version, "attributes": { "name": "Alice" } })
    }

    fn orchestrator(
        agent: MockAgent,
        resolver: Arc<MockResolver>,
        timeout: Duration,
    ) -> (BatchOrchestrator<MockAgent, MockResolver>, Arc<MockAgent>) {
        let correlator = agent.correlator.clone();
        let agent = Arc::new(agent);
        let orchestrator = BatchOrchestrator::new(
            agent.clone(),
            resolver,
            correlator,
            OrchestratorConfig {
                cred_ex_timeout: timeout,
            },
        );
        (orchestrator, agent)
    }

    fn batch(response: IssuanceResponse) -> Vec<IssuanceOutcome> {
        match response {
            IssuanceResponse::Batch(outcomes) => outcomes,
            IssuanceResponse::Single(_) => panic!("expected a batch response"),
        }
    }

    #[tokio::test]
    async fn test_known_and_unknown_schema() {
        let correlator = EventCorrelator::new(CorrelatorConfig::default());
        let (orchestrator, agent) = orchestrator(
            MockAgent::new(correlator.clone()),
            resolver(false),
            Duration::from_secs(5),
        );
        let profile = profile(vec![schema("Passport", "1.0", Some("CD1"))]);

        let response = orchestrator
            .issue_json(
                json!([request("Passport", "1.0"), request("Ghost", "9.9")]),
                &profile,
            )
            .await
            .unwrap();
        let outcomes = batch(response);

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].order, 0);
        assert!(outcomes[0].is_success());
        assert_eq!(outcomes[1].order, 1);
        assert_eq!(outcomes[1].failure_kind(), Some(FailureKind::ValidationError));
        // Only the known schema reached the agent.
        assert_eq!(agent.offers.lock().len(), 1);
        assert_eq!(correlator.active_waits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_agent_times_out() {
        let correlator = EventCorrelator::new(CorrelatorConfig::default());
        let (orchestrator, _agent) = orchestrator(
            MockAgent::new(correlator.clone()).on("Passport", Behaviour::Silent),
            resolver(false),
            Duration::from_millis(50),
        );
        let profile = profile(vec![schema("Passport", "1.0", Some("CD1"))]);

        let response = orchestrator
            .issue_json(request("Passport", "1.0"), &profile)
            .await
            .unwrap();

        match response {
            IssuanceResponse::Single(outcome) => {
                assert_eq!(outcome.failure_kind(), Some(FailureKind::TimeoutError));
            }
            IssuanceResponse::Batch(_) => panic!("expected single response"),
        }
        assert_eq!(correlator.active_waits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_before_offer_reply_times_out() {
        let correlator = EventCorrelator::new(CorrelatorConfig::default());
        let (orchestrator, _agent) = orchestrator(
            MockAgent::new(correlator.clone()).on("Passport", Behaviour::CompleteBeforeReply),
            resolver(false),
            Duration::from_millis(50),
        );
        let profile = profile(vec![schema("Passport", "1.0", Some("CD1"))]);

        let response = orchestrator
            .issue_json(request("Passport", "1.0"), &profile)
            .await
            .unwrap();

        match response {
            IssuanceResponse::Single(outcome) => {
                assert_eq!(outcome.failure_kind(), Some(FailureKind::TimeoutError));
            }
            IssuanceResponse::Batch(_) => panic!("expected single response"),
        }
        let stats = correlator.stats();
        assert_eq!(stats.unmatched, 1);
        assert_eq!(stats.timed_out, 1);
    }

    #[tokio::test]
    async fn test_dispatch_failure_keeps_upstream_response() {
        let correlator = EventCorrelator::new(CorrelatorConfig::default());
        let (orchestrator, _agent) = orchestrator(
            MockAgent::new(correlator).on("Passport", Behaviour::Reject { status: 400 }),
            resolver(false),
            Duration::from_secs(5),
        );
        let profile = profile(vec![
            schema("Passport", "1.0", Some("CD1")),
            schema("Licence", "2.0", Some("CD2")),
        ]);

        let outcomes = batch(
            orchestrator
                .issue_json(
                    json!([request("Passport", "1.0"), request("Licence", "2.0")]),
                    &profile,
                )
                .await
                .unwrap(),
        );

        match &outcomes[0].status {
            OutcomeStatus::Failed {
                kind, status, body, ..
            } => {
                assert_eq!(*kind, FailureKind::DispatchError);
                assert_eq!(*status, Some(400));
                assert_eq!(body.as_ref().unwrap()["reason"], "connection not ready");
            }
            OutcomeStatus::Succeeded { .. } => panic!("expected failure"),
        }
        // The sibling is unaffected.
        assert!(outcomes[1].is_success());
    }

    #[tokio::test]
    async fn test_missing_exchange_id() {
        let correlator = EventCorrelator::new(CorrelatorConfig::default());
        let (orchestrator, _agent) = orchestrator(
            MockAgent::new(correlator.clone()).on("Passport", Behaviour::NoExchangeId),
            resolver(false),
            Duration::from_secs(5),
        );
        let profile = profile(vec![schema("Passport", "1.0", Some("CD1"))]);

        let outcomes = batch(
            orchestrator
                .issue_json(json!([request("Passport", "1.0")]), &profile)
                .await
                .unwrap(),
        );
        assert_eq!(
            outcomes[0].failure_kind(),
            Some(FailureKind::InternalConsistencyError)
        );
        assert_eq!(correlator.active_waits(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_exchange_is_agent_failure() {
        let correlator = EventCorrelator::new(CorrelatorConfig::default());
        let (orchestrator, _agent) = orchestrator(
            MockAgent::new(correlator).on(
                "Passport",
                Behaviour::Complete {
                    delay: Duration::from_millis(5),
                    state: "abandoned",
                },
            ),
            resolver(false),
            Duration::from_secs(5),
        );
        let profile = profile(vec![schema("Passport", "1.0", Some("CD1"))]);

        let outcomes = batch(
            orchestrator
                .issue_json(json!([request("Passport", "1.0")]), &profile)
                .await
                .unwrap(),
        );
        assert_eq!(outcomes[0].failure_kind(), Some(FailureKind::AgentReportedError));
    }

    #[tokio::test]
    async fn test_missing_cred_def_is_resolved() {
        let correlator = EventCorrelator::new(CorrelatorConfig::default());
        let resolver = resolver(false);
        let (orchestrator, agent) = orchestrator(
            MockAgent::new(correlator),
            resolver.clone(),
            Duration::from_secs(5),
        );
        let profile = profile(vec![schema("Passport", "1.0", None)]);

        let outcomes = batch(
            orchestrator
                .issue_json(json!([request("Passport", "1.0")]), &profile)
                .await
                .unwrap(),
        );

        assert!(outcomes[0].is_success());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            agent.offers.lock()[0].filter.indy.cred_def_id,
            "S:Passport:1.0:CD"
        );
    }

    #[tokio::test]
    async fn test_resolver_failure_is_dispatch_error() {
        let correlator = EventCorrelator::new(CorrelatorConfig::default());
        let (orchestrator, agent) = orchestrator(
            MockAgent::new(correlator),
            resolver(true),
            Duration::from_secs(5),
        );
        let profile = profile(vec![schema("Passport", "1.0", None)]);

        let outcomes = batch(
            orchestrator
                .issue_json(json!([request("Passport", "1.0")]), &profile)
                .await
                .unwrap(),
        );

        assert_eq!(outcomes[0].failure_kind(), Some(FailureKind::DispatchError));
        assert!(agent.offers.lock().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_elements_fail_individually() {
        let correlator = EventCorrelator::new(CorrelatorConfig::default());
        let (orchestrator, _agent) = orchestrator(
            MockAgent::new(correlator),
            resolver(false),
            Duration::from_secs(5),
        );
        let profile = profile(vec![schema("Passport", "1.0", Some("CD1"))]);

        let outcomes = batch(
            orchestrator
                .issue_json(
                    json!([
                        { "schema_name": "Passport" },
                        { "schema_name": "Passport", "schema_version": "1.0", "attributes": { "name": null } },
                        request("Passport", "1.0")
                    ]),
                    &profile,
                )
                .await
                .unwrap(),
        );

        assert_eq!(outcomes[0].failure_kind(), Some(FailureKind::ValidationError));
        assert_eq!(outcomes[1].failure_kind(), Some(FailureKind::ValidationError));
        assert!(outcomes[2].is_success());
    }

    #[tokio::test]
    async fn test_malformed_input_is_rejected() {
        let correlator = EventCorrelator::new(CorrelatorConfig::default());
        let (orchestrator, agent) = orchestrator(
            MockAgent::new(correlator),
            resolver(false),
            Duration::from_secs(5),
        );

        let result = orchestrator
            .issue_json(json!("not a request"), &profile(vec![]))
            .await;
        assert!(matches!(result, Err(OrchestratorError::MalformedInput(_))));
        assert!(agent.offers.lock().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let correlator = EventCorrelator::new(CorrelatorConfig::default());
        let (orchestrator, _agent) = orchestrator(
            MockAgent::new(correlator),
            resolver(false),
            Duration::from_secs(5),
        );

        let outcomes = batch(
            orchestrator
                .issue_json(json!([]), &profile(vec![]))
                .await
                .unwrap(),
        );
        assert!(outcomes.is_empty());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(24))]

            #[test]
            fn test_outcomes_follow_input_order(delays in proptest::collection::vec(1u64..200, 1..12)) {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .start_paused(true)
                    .build()
                    .unwrap();

                runtime.block_on(async {
                    let correlator = EventCorrelator::new(CorrelatorConfig::default());
                    let mut agent = MockAgent::new(correlator.clone());
                    let mut schemas = Vec::new();
                    let mut requests = Vec::new();
                    for (i, delay) in delays.iter().enumerate() {
                        let name = format!("Schema{i}");
                        agent = agent.on(&name, Behaviour::Complete {
                            delay: Duration::from_millis(*delay),
                            state: "done",
                        });
                        schemas.push(schema(&name, "1.0", Some("CD")));
                        requests.push(request(&name, "1.0"));
                    }
                    let (orchestrator, _agent) =
                        orchestrator(agent, resolver(false), Duration::from_secs(5));

                    let outcomes = batch(
                        orchestrator
                            .issue_json(Value::Array(requests), &profile(schemas))
                            .await
                            .unwrap(),
                    );

                    assert_eq!(outcomes.len(), delays.len());
                    for (i, outcome) in outcomes.iter().enumerate() {
                        assert_eq!(outcome.order, i);
                        assert!(outcome.is_success());
                    }
                });
            }
        }
    }
}
