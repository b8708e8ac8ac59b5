//! Per-item outcomes and the aggregate response.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Why an item failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request names an unknown schema or could not be read.
    ValidationError,
    /// The agent rejected the dispatch, or a prerequisite lookup failed.
    DispatchError,
    /// No completion event arrived in time.
    TimeoutError,
    /// The agent accepted the dispatch but returned no exchange id.
    InternalConsistencyError,
    /// The agent reported the exchange as failed.
    AgentReportedError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ValidationError => "validation error",
            Self::DispatchError => "dispatch error",
            Self::TimeoutError => "timeout",
            Self::InternalConsistencyError => "internal consistency error",
            Self::AgentReportedError => "agent reported error",
        };
        f.write_str(name)
    }
}

/// Result of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The exchange completed; `payload` is the completion event body.
    Succeeded { payload: Value },
    Failed {
        kind: FailureKind,
        detail: String,
        /// Upstream HTTP status, when the failure came from the agent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        /// Upstream response body, when there was one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },
}

/// Outcome of the item at `order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuanceOutcome {
    pub order: usize,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl IssuanceOutcome {
    pub fn succeeded(order: usize, payload: Value) -> Self {
        Self {
            order,
            status: OutcomeStatus::Succeeded { payload },
        }
    }

    pub fn failed(order: usize, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            order,
            status: OutcomeStatus::Failed {
                kind,
                detail: detail.into(),
                status: None,
                body: None,
            },
        }
    }

    /// Attach the upstream response to a failure. No-op on success.
    #[must_use]
    pub fn with_upstream(mut self, upstream_status: Option<u16>, upstream_body: Option<Value>) -> Self {
        if let OutcomeStatus::Failed { status, body, .. } = &mut self.status {
            *status = upstream_status;
            *body = upstream_body;
        }
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.status {
            OutcomeStatus::Failed { kind, .. } => Some(*kind),
            OutcomeStatus::Succeeded { .. } => None,
        }
    }
}

/// What the caller gets back: shaped like the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IssuanceResponse {
    Single(IssuanceOutcome),
    /// Sorted by `order`, one entry per input element.
    Batch(Vec<IssuanceOutcome>),
}

impl IssuanceResponse {
    pub fn outcomes(&self) -> &[IssuanceOutcome] {
        match self {
            Self::Single(outcome) => std::slice::from_ref(outcome),
            Self::Batch(outcomes) => outcomes,
        }
    }
}
