//! Publishing side of the bus.

use crate::events::{AgentEvent, EventFilter};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Where webhook ingress hands off agent events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Hand `event` to every current subscriber and return how many there
    /// were. An event published with no subscriber is lost.
    async fn publish(&self, event: AgentEvent) -> usize;

    /// Events accepted since startup, delivered or not.
    fn events_published(&self) -> u64;
}

/// Process-local bus over a `tokio::sync::broadcast` channel.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<AgentEvent>,
    published: AtomicU64,
    undelivered: AtomicU64,
    capacity: usize,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// `capacity` bounds how far a subscriber may fall behind.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            published: AtomicU64::new(0),
            undelivered: AtomicU64::new(0),
            capacity,
        }
    }

    /// Receive events matching `filter` from now on. Nothing published
    /// earlier is replayed.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, "Event subscription opened");
        Subscription::new(self.sender.subscribe(), filter)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events that found no subscriber.
    #[must_use]
    pub fn undelivered(&self) -> u64 {
        self.undelivered.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: AgentEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let topic = event.topic;
        let correlation_id = event.correlation_id.clone();
        let state = event.state.clone();

        match self.sender.send(event) {
            Ok(subscribers) => {
                debug!(
                    topic = ?topic,
                    correlation_id = %correlation_id,
                    state = %state,
                    subscribers,
                    "Agent event published"
                );
                subscribers
            }
            Err(_) => {
                self.undelivered.fetch_add(1, Ordering::Relaxed);
                warn!(
                    topic = ?topic,
                    correlation_id = %correlation_id,
                    state = %state,
                    "Agent event lost: no subscriber"
                );
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
