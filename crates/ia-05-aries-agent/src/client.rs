//! Admin API client for the issuer's Aries agent.

use crate::config::{AgentConfig, RemoteAgentConfig};
use crate::error::{AgentError, AgentResult};
use crate::operations::{
    AgentOperation, CredDefCreateRequest, EndorserMetadataPayload, EndorserRequestPayload,
    RegisterDidPayload, SchemaCreateRequest,
};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

const DIDEXCHANGE_PROTOCOL: &str = "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/didexchange/1.0";
const AUTHOR_JOB: &str = "TRANSACTION_AUTHOR";

/// Admin endpoint of one agent.
#[derive(Debug, Clone)]
struct Endpoint {
    base_url: String,
    api_key: Option<String>,
}

impl Endpoint {
    fn new(admin_url: &str, api_key: Option<String>) -> Self {
        Self {
            base_url: admin_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Async client over the agent admin API.
///
/// One instance is shared by the whole agency. Every call takes an optional
/// sub-wallet token, sent as a bearer token.
pub struct AriesAgentClient {
    http: Client,
    agent: Endpoint,
    registry: Option<(Endpoint, String)>,
    endorser: Option<(Endpoint, String)>,
    taa_mechanism: String,
    taa: OnceCell<Value>,
}

impl AriesAgentClient {
    pub fn new(config: &AgentConfig) -> AgentResult<Self> {
        config
            .validate()
            .map_err(|e| AgentError::Config(e.to_string()))?;

        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        let remote = |r: &RemoteAgentConfig| {
            (Endpoint::new(&r.admin_url, r.api_key.clone()), r.alias.clone())
        };

        Ok(Self {
            http,
            agent: Endpoint::new(&config.admin_url, config.api_key.clone()),
            registry: config.registry.as_ref().map(remote),
            endorser: config.endorser.as_ref().map(remote),
            taa_mechanism: config.taa_mechanism.clone(),
            taa: OnceCell::new(),
        })
    }

    pub fn admin_url(&self) -> &str {
        &self.agent.base_url
    }

    // =========================================================================
    // TRANSPORT
    // =========================================================================

    fn request(
        &self,
        endpoint: &Endpoint,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> RequestBuilder {
        let mut builder = self.http.request(method, endpoint.url(path));
        if let Some(key) = &endpoint.api_key {
            builder = builder.header("x-api-key", key);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> AgentResult<Value> {
        let response = builder.send().await?;
        read_response(response).await
    }

    fn registry(&self) -> AgentResult<&(Endpoint, String)> {
        self.registry
            .as_ref()
            .ok_or_else(|| AgentError::Config("no credential registry agent configured".into()))
    }

    fn endorser(&self) -> AgentResult<&(Endpoint, String)> {
        self.endorser
            .as_ref()
            .ok_or_else(|| AgentError::Config("no endorser agent configured".into()))
    }

    // =========================================================================
    // READINESS
    // =========================================================================

    /// `true` when the agent reports itself ready.
    pub async fn is_ready(&self) -> AgentResult<bool> {
        let body = self
            .send(self.request(&self.agent, Method::GET, "/status/ready", None))
            .await?;
        Ok(body.get("ready").and_then(Value::as_bool).unwrap_or(false))
    }

    // =========================================================================
    // CONNECTIONS
    // =========================================================================

    /// Connect to the credential registry agent.
    pub async fn create_registry_connection(
        &self,
        alias: &str,
        token: Option<&str>,
    ) -> AgentResult<Value> {
        let (endpoint, target_alias) = self.registry()?;
        self.new_connection(endpoint, target_alias, alias, token, false)
            .await
    }

    /// Connect to the endorser agent, presenting our public DID.
    pub async fn create_endorser_connection(
        &self,
        alias: &str,
        token: Option<&str>,
    ) -> AgentResult<Value> {
        let (endpoint, target_alias) = self.endorser()?;
        self.new_connection(endpoint, target_alias, alias, token, true)
            .await
    }

    async fn new_connection(
        &self,
        target: &Endpoint,
        target_alias: &str,
        my_alias: &str,
        token: Option<&str>,
        use_public_did: bool,
    ) -> AgentResult<Value> {
        debug!(remote = %target_alias, alias = %my_alias, "Creating connection invitation");
        let created = self
            .send(
                self.request(target, Method::POST, "/out-of-band/create-invitation", None)
                    .json(&json!({
                        "alias": my_alias,
                        "handshake_protocols": [DIDEXCHANGE_PROTOCOL],
                        "my_label": target_alias,
                        "use_public_did": use_public_did,
                    })),
            )
            .await?;
        let invitation = created
            .get("invitation")
            .cloned()
            .ok_or_else(|| AgentError::Decode("invitation missing from response".into()))?;

        debug!(remote = %target_alias, "Accepting connection invitation");
        self.send(
            self.request(&self.agent, Method::POST, "/out-of-band/receive-invitation", token)
                .query(&[("alias", target_alias)])
                .json(&invitation),
        )
        .await
    }

    // =========================================================================
    // WALLET
    // =========================================================================

    pub async fn create_did(&self, token: Option<&str>) -> AgentResult<Value> {
        self.send(
            self.request(&self.agent, Method::POST, "/wallet/did/create", token)
                .json(&json!({})),
        )
        .await
    }

    pub async fn fetch_public_did(&self, token: Option<&str>) -> AgentResult<Value> {
        self.send(self.request(&self.agent, Method::GET, "/wallet/did/public", token))
            .await
    }

    pub async fn publish_did(&self, did: &str, token: Option<&str>) -> AgentResult<Value> {
        self.send(
            self.request(&self.agent, Method::POST, "/wallet/did/public", token)
                .query(&[("did", did)]),
        )
        .await
    }

    // =========================================================================
    // SCHEMAS
    // =========================================================================

    pub async fn schema_details(&self, schema_id: &str, token: Option<&str>) -> AgentResult<Value> {
        let body = self
            .send(self.request(
                &self.agent,
                Method::GET,
                &format!("/schemas/{schema_id}"),
                token,
            ))
            .await?;
        Ok(body.get("schema").cloned().unwrap_or(Value::Null))
    }

    /// Ids of all schemas this wallet has created.
    pub async fn list_schemas(&self, token: Option<&str>) -> AgentResult<Vec<String>> {
        let body = self
            .send(self.request(&self.agent, Method::GET, "/schemas/created", token))
            .await?;
        Ok(string_list(&body, "schema_ids"))
    }

    /// Id of a schema this wallet created with the given name and version.
    pub async fn find_schema(
        &self,
        schema_name: &str,
        schema_version: &str,
        token: Option<&str>,
    ) -> AgentResult<Option<String>> {
        let body = self
            .send(
                self.request(&self.agent, Method::GET, "/schemas/created", token)
                    .query(&[("schema_name", schema_name), ("schema_version", schema_version)]),
            )
            .await?;
        Ok(string_list(&body, "schema_ids").into_iter().next())
    }

    pub async fn create_schema(
        &self,
        request: &SchemaCreateRequest,
        token: Option<&str>,
    ) -> AgentResult<Value> {
        let mut builder = self
            .request(&self.agent, Method::POST, "/schemas", token)
            .json(&json!({
                "schema_name": request.schema_name,
                "schema_version": request.schema_version,
                "attributes": request.attributes,
            }));
        if let Some(conn_id) = &request.conn_id {
            builder = builder.query(&[
                ("conn_id", conn_id.as_str()),
                ("create_transaction_for_endorser", "true"),
            ]);
        }
        self.send(builder).await
    }

    // =========================================================================
    // CREDENTIAL DEFINITIONS
    // =========================================================================

    /// Credential definition this wallet created for `schema_id`.
    pub async fn cred_def_for_schema(
        &self,
        schema_id: &str,
        token: Option<&str>,
    ) -> AgentResult<Option<String>> {
        let body = self
            .send(
                self.request(&self.agent, Method::GET, "/credential-definitions/created", token)
                    .query(&[("schema_id", schema_id)]),
            )
            .await?;
        Ok(string_list(&body, "credential_definition_ids")
            .into_iter()
            .next())
    }

    pub async fn find_cred_def(
        &self,
        schema_name: &str,
        schema_version: &str,
        token: Option<&str>,
    ) -> AgentResult<Option<String>> {
        let body = self
            .send(
                self.request(&self.agent, Method::GET, "/credential-definitions/created", token)
                    .query(&[("schema_name", schema_name), ("schema_version", schema_version)]),
            )
            .await?;
        Ok(string_list(&body, "credential_definition_ids")
            .into_iter()
            .next())
    }

    pub async fn create_cred_def(
        &self,
        request: &CredDefCreateRequest,
        token: Option<&str>,
    ) -> AgentResult<Value> {
        let mut builder = self
            .request(&self.agent, Method::POST, "/credential-definitions", token)
            .json(&json!({
                "schema_id": request.schema_id,
                "support_revocation": request.support_revocation,
                "tag": request.tag,
            }));
        if let Some(conn_id) = &request.conn_id {
            builder = builder.query(&[
                ("conn_id", conn_id.as_str()),
                ("create_transaction_for_endorser", "true"),
            ]);
        }
        self.send(builder).await
    }

    // =========================================================================
    // CREDENTIALS
    // =========================================================================

    pub async fn send_credential(&self, body: &Value, token: Option<&str>) -> AgentResult<Value> {
        self.send(
            self.request(&self.agent, Method::POST, "/issue-credential-2.0/send", token)
                .json(body),
        )
        .await
    }

    pub async fn send_offer(&self, body: &Value, token: Option<&str>) -> AgentResult<Value> {
        self.send(
            self.request(
                &self.agent,
                Method::POST,
                "/issue-credential-2.0/send-offer",
                token,
            )
            .json(body),
        )
        .await
    }

    pub async fn submit_issuer_registration(
        &self,
        body: &Value,
        token: Option<&str>,
    ) -> AgentResult<Value> {
        self.send(
            self.request(&self.agent, Method::POST, "/issuer_registration/send", token)
                .json(body),
        )
        .await
    }

    // =========================================================================
    // ENDORSEMENT
    // =========================================================================

    pub async fn create_endorser_request(
        &self,
        payload: &EndorserRequestPayload,
        token: Option<&str>,
    ) -> AgentResult<Value> {
        self.send(
            self.request(&self.agent, Method::POST, "/transactions/create-request", token)
                .query(&[("tran_id", payload.tran_id.as_str())])
                .json(&json!({ "expires_time": payload.expires_time })),
        )
        .await
    }

    /// Take the author role on the endorser connection and record the
    /// endorser's DID against it.
    pub async fn set_endorser_metadata(
        &self,
        payload: &EndorserMetadataPayload,
        token: Option<&str>,
    ) -> AgentResult<Value> {
        let conn = &payload.connection_id;
        self.send(
            self.request(
                &self.agent,
                Method::POST,
                &format!("/transactions/{conn}/set-endorser-role"),
                token,
            )
            .query(&[("transaction_my_job", AUTHOR_JOB)]),
        )
        .await?;
        self.send(
            self.request(
                &self.agent,
                Method::POST,
                &format!("/transactions/{conn}/set-endorser-info"),
                token,
            )
            .query(&[
                ("endorser_did", payload.did.as_str()),
                ("endorser_name", payload.alias.as_str()),
            ]),
        )
        .await
    }

    /// Write an endorsed transaction to the ledger. `true` on success.
    pub async fn write_transaction(
        &self,
        transaction_id: &str,
        token: Option<&str>,
    ) -> AgentResult<bool> {
        self.send(self.request(
            &self.agent,
            Method::POST,
            &format!("/transactions/{transaction_id}/write"),
            token,
        ))
        .await?;
        Ok(true)
    }

    /// Register a DID on the ledger through the endorser agent.
    pub async fn register_did(&self, payload: &RegisterDidPayload) -> AgentResult<Value> {
        let (endpoint, endorser_alias) = self.endorser()?;
        debug!(did = %payload.did, "Registering DID as transaction author");
        let alias = payload.alias.as_deref().unwrap_or(endorser_alias);
        let body = self
            .send(
                self.request(endpoint, Method::POST, "/ledger/register-nym", None)
                    .query(&[
                        ("did", payload.did.as_str()),
                        ("verkey", payload.verkey.as_str()),
                        ("alias", alias),
                    ])
                    .json(&json!({})),
            )
            .await?;
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    // =========================================================================
    // LEDGER
    // =========================================================================

    /// Transaction author agreement, fetched once per client.
    pub async fn fetch_taa(&self, token: Option<&str>) -> AgentResult<&Value> {
        self.taa
            .get_or_try_init(|| async {
                debug!("Fetching TAA");
                let body = self
                    .send(self.request(&self.agent, Method::GET, "/ledger/taa", token))
                    .await?;
                Ok::<_, AgentError>(body.get("result").cloned().unwrap_or(Value::Null))
            })
            .await
    }

    /// Accept the TAA if the ledger requires one; `{}` otherwise.
    pub async fn accept_taa(&self, token: Option<&str>) -> AgentResult<Value> {
        let taa = self.fetch_taa(token).await?;
        let required = taa
            .get("taa_required")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !required {
            return Ok(json!({}));
        }

        let record = taa.get("taa_record").cloned().unwrap_or(Value::Null);
        debug!("Accepting TAA");
        self.send(
            self.request(&self.agent, Method::POST, "/ledger/taa/accept", token)
                .json(&json!({
                    "mechanism": self.taa_mechanism,
                    "text": record.get("text"),
                    "version": record.get("version"),
                })),
        )
        .await
    }

    // =========================================================================
    // MULTITENANCY
    // =========================================================================

    pub async fn create_sub_wallet(&self, body: &Value) -> AgentResult<Value> {
        self.send(
            self.request(&self.agent, Method::POST, "/multitenancy/wallet", None)
                .json(body),
        )
        .await
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Run a validated operation and return the agent's JSON answer.
    pub async fn execute(&self, operation: &AgentOperation, token: Option<&str>) -> AgentResult<Value> {
        use AgentOperation as Op;

        let (service, action) = operation.kind();
        debug!(%service, %action, "Executing agent operation");

        let result = match operation {
            Op::CreateRegistryConnection(p) => self.create_registry_connection(&p.alias, token).await,
            Op::CreateEndorserConnection(p) => self.create_endorser_connection(&p.alias, token).await,
            Op::CreateDid => self.create_did(token).await,
            Op::FetchPublicDid => self.fetch_public_did(token).await,
            Op::PublishDid(p) => self.publish_did(&p.did, token).await,
            Op::SchemaDetails(p) => self.schema_details(&p.schema_id, token).await,
            Op::ListSchemas => self.list_schemas(token).await.map(|ids| json!(ids)),
            Op::CreateSchema(req) => self.create_schema(req, token).await,
            Op::FindSchema(p) => self
                .find_schema(&p.schema_name, &p.schema_version, token)
                .await
                .map(|id| json!(id)),
            Op::CredDefForSchema(p) => self
                .cred_def_for_schema(&p.schema_id, token)
                .await
                .map(|id| json!(id)),
            Op::CreateCredDef(req) => self.create_cred_def(req, token).await,
            Op::FindCredDef(p) => self
                .find_cred_def(&p.schema_name, &p.schema_version, token)
                .await
                .map(|id| json!(id)),
            Op::SendCredential(body) => self.send_credential(body, token).await,
            Op::SendOffer(body) => self.send_offer(body, token).await,
            Op::SubmitIssuerRegistration(body) => self.submit_issuer_registration(body, token).await,
            Op::CreateEndorserRequest(p) => self.create_endorser_request(p, token).await,
            Op::SetEndorserMetadata(p) => self.set_endorser_metadata(p, token).await,
            Op::WriteTransaction(p) => self
                .write_transaction(&p.transaction_id, token)
                .await
                .map(Value::Bool),
            Op::RegisterDid(p) => self.register_did(p).await,
            Op::AcceptTaa => self.accept_taa(token).await,
            Op::CreateSubWallet(body) => self.create_sub_wallet(body).await,
        };

        if let Err(e) = &result {
            warn!(%service, %action, status = ?e.status(), "Agent operation failed: {}", e);
        }
        result
    }
}

/// Map a response to its JSON body, or to [`AgentError::Remote`] for any
/// non-2xx status.
async fn read_response(response: Response) -> AgentResult<Value> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        let body = if bytes.is_empty() {
            None
        } else {
            Some(
                serde_json::from_slice(&bytes)
                    .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())),
            )
        };
        return Err(AgentError::Remote {
            status: status.as_u16(),
            status_text: status
                .canonical_reason()
                .unwrap_or("Unknown Status")
                .to_string(),
            body,
        });
    }

    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| AgentError::Decode(e.to_string()))
}

fn string_list(body: &Value, field: &str) -> Vec<String> {
    body.get(field)
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
