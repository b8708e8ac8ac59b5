//! # Agent Events
//!
//! Typed form of the agent's webhook notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::CorrelationId;
use std::fmt;

/// A webhook notification republished onto the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Webhook topic the notification arrived on.
    pub topic: EventTopic,
    /// Id of the protocol record the notification is about.
    pub correlation_id: CorrelationId,
    /// Record state reported by the agent.
    pub state: EventState,
    /// Full webhook body.
    pub payload: serde_json::Value,
    /// When the ingress accepted the notification.
    pub received_at: DateTime<Utc>,
}

impl AgentEvent {
    /// Build an event stamped with the current time.
    pub fn new(
        topic: EventTopic,
        correlation_id: impl Into<CorrelationId>,
        state: EventState,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            topic,
            correlation_id: correlation_id.into(),
            state,
            payload,
            received_at: Utc::now(),
        }
    }

    /// Failure description if the agent reported the record as failed.
    ///
    /// An `error_msg` in the payload wins over the state; an abandoned or
    /// deleted record without one gets a generic description.
    pub fn failure_detail(&self) -> Option<String> {
        if let Some(msg) = self
            .payload
            .get("error_msg")
            .and_then(serde_json::Value::as_str)
            .filter(|m| !m.is_empty())
        {
            return Some(msg.to_string());
        }
        match self.state {
            EventState::Abandoned => Some("credential exchange abandoned".to_string()),
            EventState::Deleted => Some("credential exchange deleted before completion".to_string()),
            _ => None,
        }
    }
}

/// Record state carried by a webhook.
///
/// Covers the issue-credential 2.0 states; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventState {
    ProposalSent,
    ProposalReceived,
    OfferSent,
    OfferReceived,
    RequestSent,
    RequestReceived,
    CredentialIssued,
    CredentialReceived,
    Done,
    Abandoned,
    Deleted,
    Other(String),
}

impl EventState {
    /// Parse the agent's wire representation.
    pub fn parse(state: &str) -> Self {
        match state {
            "proposal-sent" => Self::ProposalSent,
            "proposal-received" => Self::ProposalReceived,
            "offer-sent" => Self::OfferSent,
            "offer-received" => Self::OfferReceived,
            "request-sent" => Self::RequestSent,
            "request-received" => Self::RequestReceived,
            "credential-issued" => Self::CredentialIssued,
            "credential-received" => Self::CredentialReceived,
            "done" | "credential_acked" => Self::Done,
            "abandoned" => Self::Abandoned,
            "deleted" => Self::Deleted,
            other => Self::Other(other.to_string()),
        }
    }

    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ProposalSent => "proposal-sent",
            Self::ProposalReceived => "proposal-received",
            Self::OfferSent => "offer-sent",
            Self::OfferReceived => "offer-received",
            Self::RequestSent => "request-sent",
            Self::RequestReceived => "request-received",
            Self::CredentialIssued => "credential-issued",
            Self::CredentialReceived => "credential-received",
            Self::Done => "done",
            Self::Abandoned => "abandoned",
            Self::Deleted => "deleted",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for EventState {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<EventState> for String {
    fn from(state: EventState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Webhook topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// `issue_credential_v2_0` (and the legacy `issue_credential`).
    IssueCredential,
    /// `connections` and `out_of_band`.
    Connections,
    /// `endorse_transaction`.
    EndorseTransaction,
    /// `issuer_registration`.
    IssuerRegistration,
    /// Any topic the agency does not act on.
    Other,
    /// All events (no filtering).
    All,
}

impl EventTopic {
    /// Map a webhook path segment to a topic.
    pub fn from_webhook(topic: &str) -> Self {
        match topic {
            "issue_credential_v2_0" | "issue_credential" => Self::IssueCredential,
            "connections" | "out_of_band" => Self::Connections,
            "endorse_transaction" => Self::EndorseTransaction,
            "issuer_registration" => Self::IssuerRegistration,
            _ => Self::Other,
        }
    }

    /// Field of the webhook body that carries the record id.
    pub fn correlation_field(&self) -> Option<&'static str> {
        match self {
            Self::IssueCredential => Some("cred_ex_id"),
            Self::Connections => Some("connection_id"),
            Self::EndorseTransaction => Some("transaction_id"),
            Self::IssuerRegistration => Some("issuer_registration_id"),
            Self::Other | Self::All => None,
        }
    }
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &AgentEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic)
    }
}
