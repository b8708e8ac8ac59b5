//! Agent client errors.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent answered with a non-success status.
    #[error("agent returned {status} {status_text}")]
    Remote {
        status: u16,
        status_text: String,
        body: Option<Value>,
    },

    /// The request never produced a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response could not be read as expected.
    #[error("failed to decode agent response: {0}")]
    Decode(String),

    /// The operation payload did not match the operation.
    #[error("invalid payload for {operation}: {reason}")]
    InvalidPayload { operation: String, reason: String },

    /// No such operation.
    #[error("the operation {service}/{action} is not supported")]
    Unsupported { service: String, action: String },

    /// The operation needs configuration that is absent.
    #[error("agent client not configured: {0}")]
    Config(String),
}

impl AgentError {
    /// Upstream status, if the agent answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Upstream body, if the agent sent one.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Remote { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    /// Short human-readable description: the status text for remote errors,
    /// the error message otherwise.
    pub fn message(&self) -> String {
        match self {
            Self::Remote { status_text, .. } => status_text.clone(),
            other => other.to_string(),
        }
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
