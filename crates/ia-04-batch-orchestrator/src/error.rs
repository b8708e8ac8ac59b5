//! Orchestrator error types.
//!
//! Per-item problems never surface here: they become
//! [`crate::domain::OutcomeStatus::Failed`] entries. Only input that cannot be
//! read at all fails the whole call.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// Top-level input is neither a request object nor an array of them.
    #[error("malformed input: {0}")]
    MalformedInput(String),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
