//! # IA-04 Batch Orchestrator
//!
//! Issues one credential or a batch of them on behalf of an issuer and
//! returns one outcome per request, in request order.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌────────────────────────────────────┐
//!   IssuanceInput ──→│          BatchOrchestrator         │──→ IssuanceResponse
//!                    │                                    │
//!                    │  schema lookup (issuer profile)    │
//!                    │  CredDefResolver  (outbound port)  │
//!                    │  CredentialDispatcher (outbound)   │
//!                    │  EventCorrelator  (ia-03)          │
//!                    └────────────────────────────────────┘
//! ```
//!
//! ## Failure isolation
//!
//! Every problem with a single request is recorded in that request's
//! outcome with a [`domain::FailureKind`]. The call itself only fails when
//! the input is neither an object nor an array.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use config::OrchestratorConfig;
pub use domain::{
    CredentialOffer, FailureKind, IssuanceInput, IssuanceOutcome, IssuanceRequest,
    IssuanceResponse, OutcomeStatus,
};
pub use error::{OrchestratorError, OrchestratorResult};
pub use ports::{CredDefResolver, CredentialDispatcher, IssuanceApi, UpstreamFailure};
pub use service::BatchOrchestrator;
