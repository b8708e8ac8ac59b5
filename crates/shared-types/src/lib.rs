//! # Shared Types Crate
//!
//! Domain entities used across the issuer agency crates.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every cross-crate type is defined here.
//! - **Opaque Agent Payloads**: the agent's REST and webhook bodies stay
//!   `serde_json::Value`; only the fields the agency acts on are typed.

pub mod correlation;
pub mod entities;

pub use correlation::CorrelationId;
pub use entities::*;
