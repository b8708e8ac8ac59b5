//! Domain layer: requests, offers and outcomes.

pub mod offer;
pub mod outcome;
pub mod request;

pub use offer::{format_offer, stringify_attribute, CredentialOffer, CREDENTIAL_PREVIEW_TYPE};
pub use outcome::{FailureKind, IssuanceOutcome, IssuanceResponse, OutcomeStatus};
pub use request::{IssuanceInput, IssuanceRequest, RejectedRequest, RequestItem};
