//! Outbound port implementations backed by the Aries agent client.

use async_trait::async_trait;
use ia_01_resource_cache::{LedgerAuthor, LedgerError, LedgerResources};
use ia_02_readiness_gate::{ProbeError, ReadinessProbe};
use ia_04_batch_orchestrator::{
    CredDefResolver, CredentialDispatcher, CredentialOffer, UpstreamFailure,
};
use ia_05_aries_agent::operations::{
    CredDefCreateRequest, NameVersionPayload, SchemaCreateRequest, SchemaIdPayload,
};
use ia_05_aries_agent::{AgentError, AgentOperation, AgentRequest, AriesAgentClient};
use ia_06_api_gateway::{AgentCall, AgentCallError, AgentOperations};
use serde_json::Value;
use shared_types::{SchemaDefinition, SchemaRecord};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

fn upstream_failure(err: AgentError) -> UpstreamFailure {
    let failure = UpstreamFailure::new(err.message());
    match err.status() {
        Some(status) => failure.with_response(status, err.body().cloned()),
        None => failure,
    }
}

fn ledger_error(operation: &'static str, err: AgentError) -> LedgerError {
    let ledger = LedgerError::new(operation, err.message());
    match err.status() {
        Some(status) => ledger.with_response(status, err.body().cloned()),
        None => ledger,
    }
}

fn agent_call_error(err: AgentError) -> AgentCallError {
    match &err {
        AgentError::Unsupported { .. } => AgentCallError::Unsupported(err.to_string()),
        AgentError::InvalidPayload { .. } => AgentCallError::InvalidPayload(err.to_string()),
        AgentError::Config(_) => AgentCallError::Unavailable(err.to_string()),
        _ => AgentCallError::Upstream {
            message: err.message(),
            status: err.status(),
            body: err.body().cloned(),
        },
    }
}

/// Optional id answered by a lookup operation.
fn found_id(value: Value) -> Option<String> {
    value.as_str().filter(|id| !id.is_empty()).map(str::to_string)
}

/// Id of a created ledger resource. Endorsed writes nest it under `sent`.
fn created_id(body: &Value, field: &str) -> Option<String> {
    body.get(field)
        .or_else(|| body.get("sent").and_then(|sent| sent.get(field)))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

// =============================================================================
// READINESS
// =============================================================================

pub struct AgentReadinessProbe {
    client: Arc<AriesAgentClient>,
}

impl AgentReadinessProbe {
    pub fn new(client: Arc<AriesAgentClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReadinessProbe for AgentReadinessProbe {
    async fn is_ready(&self) -> Result<bool, ProbeError> {
        self.client
            .is_ready()
            .await
            .map_err(|e| ProbeError(e.to_string()))
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

pub struct AgentDispatcher {
    client: Arc<AriesAgentClient>,
}

impl AgentDispatcher {
    pub fn new(client: Arc<AriesAgentClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialDispatcher for AgentDispatcher {
    async fn send_offer(
        &self,
        offer: &CredentialOffer,
        wallet_token: Option<&str>,
    ) -> Result<Value, UpstreamFailure> {
        let body = serde_json::to_value(offer)
            .map_err(|e| UpstreamFailure::new(format!("failed to encode offer: {e}")))?;
        self.client
            .send_offer(&body, wallet_token)
            .await
            .map_err(upstream_failure)
    }
}

// =============================================================================
// LEDGER
// =============================================================================

/// Schema and credential definition calls for one issuer wallet.
///
/// Writes accept the ledger's transaction author agreement first, once per
/// process.
pub struct AgentLedgerAuthor {
    client: Arc<AriesAgentClient>,
    wallet_token: Option<String>,
    endorser_connection_id: Option<String>,
    taa_accepted: OnceCell<()>,
}

impl AgentLedgerAuthor {
    pub fn new(
        client: Arc<AriesAgentClient>,
        wallet_token: Option<String>,
        endorser_connection_id: Option<String>,
    ) -> Self {
        Self {
            client,
            wallet_token,
            endorser_connection_id,
            taa_accepted: OnceCell::new(),
        }
    }

    async fn run(&self, operation: &'static str, op: AgentOperation) -> Result<Value, LedgerError> {
        self.client
            .execute(&op, self.wallet_token.as_deref())
            .await
            .map_err(|e| ledger_error(operation, e))
    }

    async fn accept_taa(&self) -> Result<(), LedgerError> {
        self.taa_accepted
            .get_or_try_init(|| async {
                let accepted = self.run("accept_taa", AgentOperation::AcceptTaa).await?;
                if accepted.as_object().is_some_and(|body| !body.is_empty()) {
                    info!("Transaction author agreement accepted");
                }
                Ok::<_, LedgerError>(())
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl LedgerAuthor for AgentLedgerAuthor {
    async fn find_schema(&self, name: &str, version: &str) -> Result<Option<String>, LedgerError> {
        let op = AgentOperation::FindSchema(NameVersionPayload {
            schema_name: name.to_string(),
            schema_version: version.to_string(),
        });
        self.run("find_schema", op).await.map(found_id)
    }

    async fn create_schema(&self, definition: &SchemaDefinition) -> Result<String, LedgerError> {
        self.accept_taa().await?;
        let op = AgentOperation::CreateSchema(SchemaCreateRequest {
            schema_name: definition.schema_name.clone(),
            schema_version: definition.schema_version.clone(),
            attributes: definition.attributes.clone(),
            conn_id: self.endorser_connection_id.clone(),
        });
        let body = self.run("create_schema", op).await?;
        created_id(&body, "schema_id")
            .ok_or_else(|| LedgerError::new("create_schema", "response carries no schema_id"))
    }

    async fn find_credential_definition(
        &self,
        schema_id: &str,
    ) -> Result<Option<String>, LedgerError> {
        let op = AgentOperation::CredDefForSchema(SchemaIdPayload {
            schema_id: schema_id.to_string(),
        });
        self.run("find_credential_definition", op).await.map(found_id)
    }

    async fn create_credential_definition(
        &self,
        schema_id: &str,
        tag: &str,
        support_revocation: bool,
    ) -> Result<String, LedgerError> {
        self.accept_taa().await?;
        let op = AgentOperation::CreateCredDef(CredDefCreateRequest {
            schema_id: schema_id.to_string(),
            tag: tag.to_string(),
            support_revocation,
            conn_id: self.endorser_connection_id.clone(),
        });
        let body = self.run("create_credential_definition", op).await?;
        created_id(&body, "credential_definition_id").ok_or_else(|| {
            LedgerError::new(
                "create_credential_definition",
                "response carries no credential_definition_id",
            )
        })
    }
}

// =============================================================================
// PASS-THROUGH OPERATIONS
// =============================================================================

/// Serves `POST /agent/operations` with the agent client.
pub struct AgentOperationRunner {
    client: Arc<AriesAgentClient>,
}

impl AgentOperationRunner {
    pub fn new(client: Arc<AriesAgentClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentOperations for AgentOperationRunner {
    async fn execute(&self, call: AgentCall) -> Result<Value, AgentCallError> {
        let request = AgentRequest {
            service: call.service,
            action: call.action,
            token: call.token,
            data: call.data,
        };
        let (operation, token) = request.into_operation().map_err(agent_call_error)?;
        self.client
            .execute(&operation, token.as_deref())
            .await
            .map_err(agent_call_error)
    }
}

/// Resolves missing credential definitions through the ledger cache.
pub struct LedgerCredDefResolver<A: LedgerAuthor> {
    ledger: Arc<LedgerResources<A>>,
}

impl<A: LedgerAuthor> LedgerCredDefResolver<A> {
    pub fn new(ledger: Arc<LedgerResources<A>>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl<A: LedgerAuthor> CredDefResolver for LedgerCredDefResolver<A> {
    async fn resolve_cred_def(&self, schema: &SchemaRecord) -> Result<String, UpstreamFailure> {
        self.ledger
            .ensure_credential_definition(&schema.schema_id)
            .await
            .map_err(|e| {
                let failure = UpstreamFailure::new(e.to_string());
                match e.status {
                    Some(status) => failure.with_response(status, e.body),
                    None => failure,
                }
            })
    }
}
