//! Ports for the batch orchestrator.

pub mod inbound;
pub mod outbound;

pub use inbound::IssuanceApi;
pub use outbound::{CredDefResolver, CredentialDispatcher, UpstreamFailure};
