//! Driven ports: the agent operations the orchestrator needs.

use crate::domain::CredentialOffer;
use async_trait::async_trait;
use serde_json::Value;
use shared_types::SchemaRecord;
use thiserror::Error;

/// An upstream call failed.
///
/// Carries the HTTP status and body when the agent answered at all.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct UpstreamFailure {
    pub message: String,
    pub status: Option<u16>,
    pub body: Option<Value>,
}

impl UpstreamFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    #[must_use]
    pub fn with_response(mut self, status: u16, body: Option<Value>) -> Self {
        self.status = Some(status);
        self.body = body;
        self
    }
}

/// Sends credential offers to the agent.
#[async_trait]
pub trait CredentialDispatcher: Send + Sync {
    /// Send `offer` and return the agent's immediate answer, which should
    /// carry the `cred_ex_id` of the new exchange.
    async fn send_offer(
        &self,
        offer: &CredentialOffer,
        wallet_token: Option<&str>,
    ) -> Result<Value, UpstreamFailure>;
}

/// Supplies a credential definition id for a schema that has none recorded.
#[async_trait]
pub trait CredDefResolver: Send + Sync {
    async fn resolve_cred_def(&self, schema: &SchemaRecord) -> Result<String, UpstreamFailure>;
}
