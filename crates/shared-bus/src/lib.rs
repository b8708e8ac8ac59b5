//! # Shared Bus - Agent Event Channel
//!
//! The agent reports progress through webhooks. The HTTP ingress republishes
//! each notification here as a typed [`AgentEvent`]; the event correlator
//! subscribes and matches events to waiting callers.
//!
//! ```text
//! ┌──────────────┐   POST /webhooks/topic/{t}   ┌──────────────┐
//! │ Aries Agent  │ ───────────────────────────→ │   Ingress    │
//! └──────────────┘                              └──────┬───────┘
//!                                                      │ publish()
//!                                                      ▼
//!                                               ┌──────────────┐
//!                                               │  Event Bus   │
//!                                               └──────┬───────┘
//!                                                      │ subscribe()
//!                                                      ▼
//!                                               ┌──────────────┐
//!                                               │  Correlator  │
//!                                               └──────────────┘
//! ```
//!
//! The bus is a fan-out channel only: it keeps no history, and a subscriber
//! that falls behind by more than the channel capacity loses the oldest
//! events (logged, never fatal).

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{AgentEvent, EventFilter, EventState, EventTopic};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
