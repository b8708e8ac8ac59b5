//! API Gateway service: router construction and the HTTP server.

use crate::config::GatewayConfig;
use crate::error::{ApiError, GatewayError};
use crate::ports::{AgentCall, AgentCallError, AgentOperations};
use crate::webhook::WebhookIngress;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use ia_04_batch_orchestrator::{IssuanceApi, IssuanceInput, IssuanceResponse};
use serde_json::Value;
use shared_bus::EventPublisher;
use shared_types::IssuerProfile;
use std::future::Future;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub issuance: Arc<dyn IssuanceApi>,
    pub profile: Arc<IssuerProfile>,
    pub events: Arc<dyn EventPublisher>,
    pub ingress: Arc<WebhookIngress>,
    /// Pass-through agent operations; `None` answers 503.
    pub agent: Option<Arc<dyn AgentOperations>>,
}

pub struct ApiGatewayService {
    config: GatewayConfig,
    state: AppState,
}

impl ApiGatewayService {
    pub fn new(
        config: GatewayConfig,
        issuance: Arc<dyn IssuanceApi>,
        profile: Arc<IssuerProfile>,
        events: Arc<dyn EventPublisher>,
    ) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let ingress = Arc::new(WebhookIngress::new(config.terminal_event_states()));
        Ok(Self {
            config,
            state: AppState {
                issuance,
                profile,
                events,
                ingress,
                agent: None,
            },
        })
    }

    /// Enable `POST /agent/operations`.
    #[must_use]
    pub fn with_agent_operations(mut self, agent: Arc<dyn AgentOperations>) -> Self {
        self.state.agent = Some(agent);
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Build the HTTP router with its middleware stack.
    ///
    /// Issuance is not under the request timeout: each item is bounded by
    /// its own credential exchange timeout, and cutting the request short
    /// would discard outcomes that already settled.
    pub fn router(&self) -> Router {
        let bounded = Router::new()
            .route("/webhooks/topic/:topic", post(receive_webhook))
            .route("/agent/operations", post(agent_operation))
            .route("/health", get(health_check))
            .layer(TimeoutLayer::new(self.config.request_timeout));

        let middleware = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(RequestBodyLimitLayer::new(self.config.max_request_size));

        Router::new()
            .route("/issuer/credentials", post(issue_credentials))
            .merge(bounded)
            .layer(middleware)
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown` completes.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.http_addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })?;

        info!(addr = %addr, "Starting HTTP server");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("API Gateway stopped");
        Ok(())
    }
}

/// Issue one credential (object body) or a batch (array body).
async fn issue_credentials(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IssuanceResponse>, ApiError> {
    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::MalformedInput(format!("body is not valid JSON: {e}")))?;
    let input = IssuanceInput::from_json(value)?;

    debug!(count = input.len(), batch = input.is_batch(), "Issuance request received");
    let response = state.issuance.issue(input, &state.profile).await;
    Ok(Json(response))
}

/// Always acknowledged; the agent must not retry.
async fn receive_webhook(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    body: Bytes,
) -> StatusCode {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(topic = %topic, error = %e, "Unreadable webhook body");
            return StatusCode::OK;
        }
    };

    if let Some(event) = state.ingress.translate(&topic, value) {
        let receivers = state.events.publish(event).await;
        debug!(topic = %topic, receivers, "Webhook republished");
    }
    StatusCode::OK
}

/// Run one agent admin operation named by `service` and `action`.
async fn agent_operation(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let agent = state.agent.as_ref().ok_or_else(|| {
        AgentCallError::Unavailable("agent operations are not enabled".into())
    })?;
    let call: AgentCall = serde_json::from_slice(&body)
        .map_err(|e| ApiError::MalformedInput(format!("invalid agent operation: {e}")))?;

    debug!(service = %call.service, action = %call.action, "Agent operation requested");
    Ok(Json(agent.execute(call).await?))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "issuer-agency",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
