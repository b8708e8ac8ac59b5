//! Driven port for pass-through agent operations.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Body of `POST /agent/operations`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentCall {
    pub service: String,
    pub action: String,
    /// Sub-wallet bearer token.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// Why an agent operation was not carried out.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentCallError {
    /// No operation by that `(service, action)` pair.
    #[error("{0}")]
    Unsupported(String),
    /// The payload does not fit the operation.
    #[error("{0}")]
    InvalidPayload(String),
    /// The agency is not set up for the operation.
    #[error("{0}")]
    Unavailable(String),
    /// The agent failed or rejected the call.
    #[error("{message}")]
    Upstream {
        message: String,
        status: Option<u16>,
        body: Option<Value>,
    },
}

#[async_trait]
pub trait AgentOperations: Send + Sync {
    /// Validate `call` and run it against the agent.
    async fn execute(&self, call: AgentCall) -> Result<Value, AgentCallError>;
}
