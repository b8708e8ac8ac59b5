//! Agent webhook translation.
//!
//! The agent posts every record change to `/webhooks/topic/{topic}`. Only
//! changes someone can act on become [`AgentEvent`]s.

use serde_json::Value;
use shared_bus::{AgentEvent, EventState, EventTopic};
use shared_types::CorrelationId;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct WebhookIngress {
    terminal_states: Vec<EventState>,
}

impl WebhookIngress {
    pub fn new(terminal_states: Vec<EventState>) -> Self {
        Self { terminal_states }
    }

    /// Translate a webhook into a bus event.
    ///
    /// Credential exchange notifications pass only in a terminal state.
    /// Other known topics pass whenever their record id is present.
    pub fn translate(&self, topic: &str, body: Value) -> Option<AgentEvent> {
        let event_topic = EventTopic::from_webhook(topic);
        let field = event_topic.correlation_field()?;

        let Some(correlation_id) = CorrelationId::from_field(&body, field) else {
            debug!(topic, field, "Webhook without record id ignored");
            return None;
        };

        let state = body
            .get("state")
            .and_then(Value::as_str)
            .map(EventState::parse)
            .unwrap_or_else(|| EventState::Other(String::new()));

        if event_topic == EventTopic::IssueCredential && !self.terminal_states.contains(&state) {
            debug!(topic, %correlation_id, %state, "Non-terminal credential exchange state ignored");
            return None;
        }

        Some(AgentEvent::new(event_topic, correlation_id, state, body))
    }
}

impl Default for WebhookIngress {
    fn default() -> Self {
        Self::new(vec![EventState::Done, EventState::Abandoned, EventState::Deleted])
    }
}
