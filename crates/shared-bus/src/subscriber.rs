//! Receiving side of the bus.

use crate::events::{AgentEvent, EventFilter};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("event bus closed")]
    Closed,
}

/// A filtered view of the bus.
///
/// A subscriber that falls more than the channel capacity behind skips the
/// oldest events; [`Subscription::lagged`] counts them.
pub struct Subscription {
    receiver: broadcast::Receiver<AgentEvent>,
    filter: EventFilter,
    lagged: u64,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<AgentEvent>, filter: EventFilter) -> Self {
        Self {
            receiver,
            filter,
            lagged: 0,
        }
    }

    /// Next matching event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<AgentEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already queued.
    pub fn try_recv(&mut self) -> Result<Option<AgentEvent>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    fn record_lag(&mut self, skipped: u64) {
        self.lagged += skipped;
        warn!(
            skipped,
            total = self.lagged,
            topics = ?self.filter.topics,
            "Subscriber fell behind; agent events skipped"
        );
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Events skipped because this subscriber fell behind.
    #[must_use]
    pub fn lagged(&self) -> u64 {
        self.lagged
    }
}
