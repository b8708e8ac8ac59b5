//! # Agent Operations
//!
//! Every call the agency makes to the agent is named by a
//! `(service, action)` pair. The pair is validated once, together with its
//! payload, into an [`AgentOperation`]; unknown pairs are rejected instead of
//! falling through to another operation.

use crate::error::AgentError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Agent API area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Connection,
    Wallet,
    Schema,
    CredDef,
    Cred,
    IssuerRegistration,
    Endorser,
    Ledger,
    Multitenancy,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Wallet => "wallet",
            Self::Schema => "schema",
            Self::CredDef => "cred_def",
            Self::Cred => "cred",
            Self::IssuerRegistration => "issuer_registration",
            Self::Endorser => "endorser",
            Self::Ledger => "ledger",
            Self::Multitenancy => "multitenancy",
        }
    }
}

impl FromStr for ServiceKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "connection" => Self::Connection,
            "wallet" => Self::Wallet,
            "schema" => Self::Schema,
            "cred_def" => Self::CredDef,
            "cred" => Self::Cred,
            "issuer_registration" => Self::IssuerRegistration,
            "endorser" => Self::Endorser,
            "ledger" => Self::Ledger,
            "multitenancy" => Self::Multitenancy,
            other => {
                return Err(AgentError::Unsupported {
                    service: other.to_string(),
                    action: String::new(),
                })
            }
        })
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verb within a service. Which verbs a service accepts is decided by
/// [`AgentOperation::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateVcr,
    CreateEndorser,
    Create,
    Fetch,
    Publish,
    Details,
    List,
    Find,
    Send,
    Submit,
    CreateRequest,
    SetMetadata,
    WriteTransaction,
    RegisterDid,
    TaaAccept,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateVcr => "create_vcr",
            Self::CreateEndorser => "create_endorser",
            Self::Create => "create",
            Self::Fetch => "fetch",
            Self::Publish => "publish",
            Self::Details => "details",
            Self::List => "list",
            Self::Find => "find",
            Self::Send => "send",
            Self::Submit => "submit",
            Self::CreateRequest => "create_request",
            Self::SetMetadata => "set_metadata",
            Self::WriteTransaction => "write_transaction",
            Self::RegisterDid => "register_did",
            Self::TaaAccept => "taa_accept",
        }
    }
}

impl FromStr for Action {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "create_vcr" => Self::CreateVcr,
            "create_endorser" => Self::CreateEndorser,
            "create" => Self::Create,
            "fetch" => Self::Fetch,
            "publish" => Self::Publish,
            "details" => Self::Details,
            "list" => Self::List,
            "find" => Self::Find,
            "send" => Self::Send,
            "submit" => Self::Submit,
            "create_request" => Self::CreateRequest,
            "set_metadata" => Self::SetMetadata,
            "write_transaction" => Self::WriteTransaction,
            "register_did" => Self::RegisterDid,
            "taa_accept" => Self::TaaAccept,
            other => {
                return Err(AgentError::Unsupported {
                    service: String::new(),
                    action: other.to_string(),
                })
            }
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasPayload {
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidPayload {
    pub did: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaIdPayload {
    pub schema_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameVersionPayload {
    pub schema_name: String,
    pub schema_version: String,
}

/// Schema to publish through the endorser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaCreateRequest {
    pub schema_name: String,
    pub schema_version: String,
    pub attributes: Vec<String>,
    /// Endorser connection the transaction is sent to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conn_id: Option<String>,
}

/// Credential definition to publish through the endorser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredDefCreateRequest {
    pub schema_id: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default)]
    pub support_revocation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conn_id: Option<String>,
}

fn default_tag() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndorserRequestPayload {
    pub tran_id: String,
    #[serde(default)]
    pub expires_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndorserMetadataPayload {
    pub connection_id: String,
    pub did: String,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDidPayload {
    pub did: String,
    pub verkey: String,
    #[serde(default)]
    pub alias: Option<String>,
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// A validated agent call.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOperation {
    /// Connect to the credential registry agent.
    CreateRegistryConnection(AliasPayload),
    /// Connect to the endorser agent using our public DID.
    CreateEndorserConnection(AliasPayload),
    CreateDid,
    FetchPublicDid,
    PublishDid(DidPayload),
    SchemaDetails(SchemaIdPayload),
    ListSchemas,
    CreateSchema(SchemaCreateRequest),
    FindSchema(NameVersionPayload),
    CredDefForSchema(SchemaIdPayload),
    CreateCredDef(CredDefCreateRequest),
    FindCredDef(NameVersionPayload),
    /// Issue without a prior offer (`/issue-credential-2.0/send`).
    SendCredential(Value),
    /// Offer a credential (`/issue-credential-2.0/send-offer`).
    SendOffer(Value),
    SubmitIssuerRegistration(Value),
    CreateEndorserRequest(EndorserRequestPayload),
    SetEndorserMetadata(EndorserMetadataPayload),
    WriteTransaction(TransactionPayload),
    RegisterDid(RegisterDidPayload),
    AcceptTaa,
    CreateSubWallet(Value),
}

impl AgentOperation {
    /// Validate a `(service, action)` pair and decode its payload.
    pub fn parse(service: ServiceKind, action: Action, data: Value) -> Result<Self, AgentError> {
        use Action as A;
        use ServiceKind as S;

        let decode_err = |reason: serde_json::Error| AgentError::InvalidPayload {
            operation: format!("{service}/{action}"),
            reason: reason.to_string(),
        };

        Ok(match (service, action) {
            (S::Connection, A::CreateVcr) => {
                Self::CreateRegistryConnection(serde_json::from_value(data).map_err(decode_err)?)
            }
            (S::Connection, A::CreateEndorser) => {
                Self::CreateEndorserConnection(serde_json::from_value(data).map_err(decode_err)?)
            }
            (S::Wallet, A::Create) => Self::CreateDid,
            (S::Wallet, A::Fetch) => Self::FetchPublicDid,
            (S::Wallet, A::Publish) => {
                Self::PublishDid(serde_json::from_value(data).map_err(decode_err)?)
            }
            (S::Schema, A::Details) => {
                Self::SchemaDetails(serde_json::from_value(data).map_err(decode_err)?)
            }
            (S::Schema, A::List) => Self::ListSchemas,
            (S::Schema, A::Create) => {
                Self::CreateSchema(serde_json::from_value(data).map_err(decode_err)?)
            }
            (S::Schema, A::Find) => {
                Self::FindSchema(serde_json::from_value(data).map_err(decode_err)?)
            }
            (S::CredDef, A::Details) => {
                Self::CredDefForSchema(serde_json::from_value(data).map_err(decode_err)?)
            }
            (S::CredDef, A::Create) => {
                Self::CreateCredDef(serde_json::from_value(data).map_err(decode_err)?)
            }
            (S::CredDef, A::Find) => {
                Self::FindCredDef(serde_json::from_value(data).map_err(decode_err)?)
            }
            (S::Cred, A::Send) => Self::SendCredential(data),
            (S::Cred, A::Create) => Self::SendOffer(data),
            (S::IssuerRegistration, A::Submit) => Self::SubmitIssuerRegistration(data),
            (S::Endorser, A::CreateRequest) => {
                Self::CreateEndorserRequest(serde_json::from_value(data).map_err(decode_err)?)
            }
            (S::Endorser, A::SetMetadata) => {
                Self::SetEndorserMetadata(serde_json::from_value(data).map_err(decode_err)?)
            }
            (S::Endorser, A::WriteTransaction) => {
                Self::WriteTransaction(serde_json::from_value(data).map_err(decode_err)?)
            }
            (S::Endorser, A::RegisterDid) => {
                Self::RegisterDid(serde_json::from_value(data).map_err(decode_err)?)
            }
            (S::Ledger, A::TaaAccept) => Self::AcceptTaa,
            (S::Multitenancy, A::Create) => Self::CreateSubWallet(data),
            (service, action) => {
                return Err(AgentError::Unsupported {
                    service: service.to_string(),
                    action: action.to_string(),
                })
            }
        })
    }

    /// [`Self::parse`] from the wire names.
    pub fn parse_str(service: &str, action: &str, data: Value) -> Result<Self, AgentError> {
        let unsupported = || AgentError::Unsupported {
            service: service.to_string(),
            action: action.to_string(),
        };
        let service = service.parse::<ServiceKind>().map_err(|_| unsupported())?;
        let action = action.parse::<Action>().map_err(|_| unsupported())?;
        Self::parse(service, action, data)
    }

    /// The `(service, action)` pair this operation answers to.
    pub fn kind(&self) -> (ServiceKind, Action) {
        use Action as A;
        use ServiceKind as S;

        match self {
            Self::CreateRegistryConnection(_) => (S::Connection, A::CreateVcr),
            Self::CreateEndorserConnection(_) => (S::Connection, A::CreateEndorser),
            Self::CreateDid => (S::Wallet, A::Create),
            Self::FetchPublicDid => (S::Wallet, A::Fetch),
            Self::PublishDid(_) => (S::Wallet, A::Publish),
            Self::SchemaDetails(_) => (S::Schema, A::Details),
            Self::ListSchemas => (S::Schema, A::List),
            Self::CreateSchema(_) => (S::Schema, A::Create),
            Self::FindSchema(_) => (S::Schema, A::Find),
            Self::CredDefForSchema(_) => (S::CredDef, A::Details),
            Self::CreateCredDef(_) => (S::CredDef, A::Create),
            Self::FindCredDef(_) => (S::CredDef, A::Find),
            Self::SendCredential(_) => (S::Cred, A::Send),
            Self::SendOffer(_) => (S::Cred, A::Create),
            Self::SubmitIssuerRegistration(_) => (S::IssuerRegistration, A::Submit),
            Self::CreateEndorserRequest(_) => (S::Endorser, A::CreateRequest),
            Self::SetEndorserMetadata(_) => (S::Endorser, A::SetMetadata),
            Self::WriteTransaction(_) => (S::Endorser, A::WriteTransaction),
            Self::RegisterDid(_) => (S::Endorser, A::RegisterDid),
            Self::AcceptTaa => (S::Ledger, A::TaaAccept),
            Self::CreateSubWallet(_) => (S::Multitenancy, A::Create),
        }
    }
}

/// Wire form of an operation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub service: String,
    pub action: String,
    /// Sub-wallet bearer token.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl AgentRequest {
    pub fn into_operation(self) -> Result<(AgentOperation, Option<String>), AgentError> {
        let operation = AgentOperation::parse_str(&self.service, &self.action, self.data)?;
        Ok((operation, self.token))
    }
}
