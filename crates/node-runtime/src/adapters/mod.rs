//! # Adapter Implementations
//!
//! Concrete implementations of the components' outbound ports, backed by the
//! Aries agent client.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     OUTER LAYER (Adapters)                          │
//! │  AgentDispatcher, AgentLedgerAuthor, AgentReadinessProbe,           │
//! │  LedgerCredDefResolver, AgentOperationRunner                        │
//! │                              ↑ implements ↑                         │
//! │                     MIDDLE LAYER (Ports)                            │
//! │  CredentialDispatcher, CredDefResolver, LedgerAuthor,               │
//! │  ReadinessProbe, AgentOperations                                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod agent;

pub use agent::{
    AgentDispatcher, AgentLedgerAuthor, AgentOperationRunner, AgentReadinessProbe,
    LedgerCredDefResolver,
};
