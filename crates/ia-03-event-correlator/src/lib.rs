//! # IA-03 Event Correlator
//!
//! The agent answers a dispatch immediately with a record id and reports the
//! outcome later through a webhook. This crate turns that pair into one
//! awaitable call with a timeout.
//!
//! ```text
//!  Orchestrator                  Correlator                     Bus
//!  ────────────                  ──────────                     ───
//!   register(cx-1) ──────────→ pending[cx-1] = tx
//!   wait() ...                                         ←── AgentEvent(cx-1)
//!                               deliver(): remove cx-1
//!   ←──────────────────────────  tx.send(event)
//! ```
//!
//! Events nobody waits for are dropped. Events for an id that resolved
//! recently are classified as duplicates and dropped as well; the
//! distinction only shows in logs and stats.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod correlator;
pub mod error;
mod recent;

pub use config::CorrelatorConfig;
pub use correlator::{
    CorrelatorStats, CorrelatorStatsSnapshot, Delivery, EventCorrelator, PendingWait,
};
pub use error::CorrelationError;
