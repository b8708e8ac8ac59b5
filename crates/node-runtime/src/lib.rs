//! # Node Runtime Library
//!
//! Exposes the wiring of the issuer agency for tests. The main entry point
//! is the `main.rs` binary.
//!
//! ## Architectural Patterns
//!
//! - **Event-Driven**: agent webhooks reach waiting callers only through the event bus
//! - **Hexagonal Architecture**: components define ports, `adapters` implement them
//! - **Explicit wiring**: every shared component is built once in `container`

#![allow(clippy::type_complexity)]

pub mod adapters;
pub mod container;

pub use container::{load_config, AgencyConfig, AgencyContainer, ConfigError, WiringError};
