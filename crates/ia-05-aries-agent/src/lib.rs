//! # IA-05 Aries Agent
//!
//! Typed client for the admin API of the Aries agent that holds the
//! issuer's wallets.
//!
//! ```text
//!   (service, action, data) ──parse──→ AgentOperation ──execute──→ JSON
//!                                                         │
//!                                   AriesAgentClient ─────┘  (reqwest)
//! ```
//!
//! Calls return as soon as the agent accepts them. Progress of a credential
//! exchange arrives later as a webhook, which is the event correlator's job.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod client;
pub mod config;
pub mod error;
pub mod operations;

pub use client::AriesAgentClient;
pub use config::{AgentConfig, AgentConfigError, RemoteAgentConfig};
pub use error::{AgentError, AgentResult};
pub use operations::{Action, AgentOperation, AgentRequest, ServiceKind};
