//! # Issuer Agency Test Suite
//!
//! Cross-crate scenarios. Every flow goes through the real HTTP router, the
//! real event bus and the real correlator; only the agent is simulated.
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs          # simulated agent that answers by webhook
//!     ├── issuance_flow.rs    # orchestrator + correlator + gateway
//!     └── agency_flow.rs      # fully wired node runtime against a mock agent API
//! ```
//!
//! ```bash
//! cargo test -p ia-tests
//! ```

pub mod integration;
