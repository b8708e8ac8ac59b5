//! Gateway errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use crate::ports::AgentCallError;
use ia_04_batch_orchestrator::OrchestratorError;
use thiserror::Error;

/// Failures of the gateway itself.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },
    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Error answered to an HTTP caller.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Body is not JSON, or neither an object nor an array.
    #[error("{0}")]
    MalformedInput(String),
    #[error(transparent)]
    Agent(#[from] AgentCallError),
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::MalformedInput(reason) => Self::MalformedInput(reason),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            Self::MalformedInput(_) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "malformed_input", "message": message }),
            ),
            Self::Agent(AgentCallError::Unsupported(_)) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "unsupported_operation", "message": message }),
            ),
            Self::Agent(AgentCallError::InvalidPayload(_)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "invalid_payload", "message": message }),
            ),
            Self::Agent(AgentCallError::Unavailable(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "agent_unavailable", "message": message }),
            ),
            Self::Agent(AgentCallError::Upstream { status, body, .. }) => (
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": "agent_error",
                    "message": message,
                    "status": status,
                    "body": body,
                }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
