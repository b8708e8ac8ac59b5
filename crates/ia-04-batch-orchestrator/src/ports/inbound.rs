//! Driving port: what callers of the orchestrator see.

use crate::domain::{IssuanceInput, IssuanceResponse};
use async_trait::async_trait;
use shared_types::IssuerProfile;

#[async_trait]
pub trait IssuanceApi: Send + Sync {
    /// Issue every request in `input` on behalf of `profile`.
    ///
    /// Never fails: each element settles into its own outcome.
    async fn issue(&self, input: IssuanceInput, profile: &IssuerProfile) -> IssuanceResponse;
}
