//! Correlator error types.

use shared_types::CorrelationId;
use std::time::Duration;
use thiserror::Error;

/// Why a wait did not produce an event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CorrelationError {
    /// No matching event arrived in time. The wait has been removed.
    #[error("no event for {correlation_id} within {timeout:?}")]
    TimedOut {
        correlation_id: CorrelationId,
        timeout: Duration,
    },

    /// Another caller is already waiting on this id.
    #[error("a wait for {0} is already registered")]
    AlreadyRegistered(CorrelationId),

    /// The correlator dropped the wait without resolving it (shutdown).
    #[error("wait for {0} was cancelled")]
    Closed(CorrelationId),
}

impl CorrelationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}
