//! # IA-06 API Gateway
//!
//! HTTP surface of the issuer agency.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /issuer/credentials` | Issue one credential (object) or a batch (array) |
//! | `POST /webhooks/topic/{topic}` | Agent notifications, republished onto the event bus |
//! | `POST /agent/operations` | Internal: one validated agent admin operation |
//! | `GET /health` | Liveness |
//!
//! Issuance answers `400` only when the body is not a request object or an
//! array of them; every per-item failure is reported inside the `200` body.
//! Webhooks are always acknowledged with `200`.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod error;
pub mod ports;
pub mod service;
pub mod webhook;

pub use config::{ConfigError, GatewayConfig};
pub use error::{ApiError, GatewayError};
pub use ports::{AgentCall, AgentCallError, AgentOperations};
pub use service::{ApiGatewayService, AppState};
pub use webhook::WebhookIngress;
