//! # Component Container
//!
//! Builds every component once, in dependency order, and shares them as
//! `Arc`s:
//!
//! ```text
//! AriesAgentClient ──→ AgentLedgerAuthor ──→ LedgerResources ──→ LedgerCredDefResolver ─┐
//!        │                                                                               │
//!        └────────────→ AgentDispatcher ──────────────────────────────→ BatchOrchestrator
//!                                                                               ▲
//! InMemoryEventBus ──→ EventCorrelator ─────────────────────────────────────────┘
//! ```

pub mod config;

pub use config::{load_config, AgencyConfig, ConfigError};

use crate::adapters::{
    AgentDispatcher, AgentLedgerAuthor, AgentOperationRunner, AgentReadinessProbe,
    LedgerCredDefResolver,
};
use ia_01_resource_cache::LedgerResources;
use ia_02_readiness_gate::ReadinessGate;
use ia_03_event_correlator::EventCorrelator;
use ia_04_batch_orchestrator::{BatchOrchestrator, IssuanceApi};
use ia_05_aries_agent::{AgentError, AriesAgentClient};
use ia_06_api_gateway::{ApiGatewayService, GatewayError};
use shared_bus::{EventFilter, EventPublisher, EventTopic, InMemoryEventBus};
use shared_types::IssuerProfile;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

pub type AgencyOrchestrator =
    BatchOrchestrator<AgentDispatcher, LedgerCredDefResolver<AgentLedgerAuthor>>;

#[derive(Debug, Error)]
pub enum WiringError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("agent client: {0}")]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Every long-lived component of the agency.
pub struct AgencyContainer {
    pub config: AgencyConfig,
    pub profile: Arc<IssuerProfile>,
    pub agent: Arc<AriesAgentClient>,
    pub bus: Arc<InMemoryEventBus>,
    pub correlator: EventCorrelator,
    pub ledger: Arc<LedgerResources<AgentLedgerAuthor>>,
    pub orchestrator: Arc<AgencyOrchestrator>,
}

impl AgencyContainer {
    pub fn new(config: AgencyConfig) -> Result<Self, WiringError> {
        let profile = Arc::new(config.load_issuer_profile()?);
        info!(
            issuer = %profile.name,
            schemas = profile.schemas.len(),
            "Issuer profile loaded"
        );

        let agent = Arc::new(AriesAgentClient::new(&config.agent_client())?);
        let bus = Arc::new(InMemoryEventBus::new());
        let correlator = EventCorrelator::new(config.correlator.clone());

        let author = Arc::new(AgentLedgerAuthor::new(
            Arc::clone(&agent),
            profile.wallet_token().map(str::to_string),
            config.issuer.endorser_connection_id.clone(),
        ));
        let ledger = Arc::new(LedgerResources::with_options(
            author,
            config.issuer.cred_def_tag.clone(),
            config.issuer.support_revocation,
        ));
        ledger.seed_from_profile(&profile.schemas);

        let orchestrator = Arc::new(BatchOrchestrator::new(
            Arc::new(AgentDispatcher::new(Arc::clone(&agent))),
            Arc::new(LedgerCredDefResolver::new(Arc::clone(&ledger))),
            correlator.clone(),
            config.orchestrator(),
        ));

        Ok(Self {
            config,
            profile,
            agent,
            bus,
            correlator,
            ledger,
            orchestrator,
        })
    }

    pub fn readiness_gate(&self) -> ReadinessGate<AgentReadinessProbe> {
        ReadinessGate::new(
            AgentReadinessProbe::new(Arc::clone(&self.agent)),
            self.config.agent.readiness_poll_interval,
        )
    }

    /// Start feeding credential exchange events to the correlator.
    pub fn spawn_correlator(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let subscription = self
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::IssueCredential]));
        let correlator = self.correlator.clone();
        tokio::spawn(async move { correlator.run(subscription, shutdown).await })
    }

    pub fn gateway(&self) -> Result<ApiGatewayService, GatewayError> {
        let issuance: Arc<dyn IssuanceApi> = self.orchestrator.clone();
        let events: Arc<dyn EventPublisher> = self.bus.clone();
        let operations = Arc::new(AgentOperationRunner::new(Arc::clone(&self.agent)));
        Ok(ApiGatewayService::new(
            self.config.http.clone(),
            issuance,
            Arc::clone(&self.profile),
            events,
        )?
        .with_agent_operations(operations))
    }
}
