//! # Issuer Agency
//!
//! Issues verifiable credentials through an Aries Cloud Agent that reports
//! completion asynchronously by webhook.
//!
//! ## Request Flow
//!
//! ```text
//! POST /issuer/credentials
//!        │
//!        ▼
//!  BatchOrchestrator ──send-offer──→ Aries Agent
//!        │                                │
//!        │ register(cred_ex_id)           │ POST /webhooks/topic/issue_credential_v2_0
//!        ▼                                ▼
//!  EventCorrelator ◄──── Event Bus ◄──── Webhook Ingress
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults, `IA_CONFIG_FILE`, `IA_*` environment)
//! 2. Wire components
//! 3. Block until the agent reports ready
//! 4. Start the event correlator
//! 5. Serve HTTP until Ctrl+C

use anyhow::{Context, Result};
use node_runtime::{load_config, AgencyConfig, AgencyContainer};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// The running agency.
struct AgencyRuntime {
    container: AgencyContainer,
    shutdown_rx: watch::Receiver<bool>,
}

impl AgencyRuntime {
    fn new(config: AgencyConfig, shutdown_rx: watch::Receiver<bool>) -> Result<Self> {
        info!("Creating issuer agency runtime");
        let container = AgencyContainer::new(config).context("Failed to wire components")?;
        Ok(Self {
            container,
            shutdown_rx,
        })
    }

    /// Run until shutdown is signalled.
    async fn run(&self) -> Result<()> {
        info!("===========================================");
        info!("  Issuer Agency v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let agent_url = self.container.agent.admin_url().to_string();
        info!(agent = %agent_url, "Waiting for agent to become ready");
        let Some(report) = self
            .container
            .readiness_gate()
            .wait_or_shutdown(self.shutdown_rx.clone())
            .await
        else {
            warn!("Shutdown requested before the agent became ready");
            return Ok(());
        };
        info!(
            attempts = report.attempts,
            elapsed = ?report.elapsed,
            "Agent is ready"
        );

        let correlator_task = self.container.spawn_correlator(self.shutdown_rx.clone());

        let gateway = self
            .container
            .gateway()
            .context("Failed to build API gateway")?;
        info!(addr = %gateway.config().http_addr(), "Serving HTTP");
        let served = gateway.serve(shutdown_signal(self.shutdown_rx.clone())).await;

        let cancelled = self.container.correlator.cancel_all();
        if cancelled > 0 {
            warn!(cancelled, "Pending credential exchanges abandoned at shutdown");
        }
        if let Err(e) = correlator_task.await {
            error!("Correlator task failed: {}", e);
        }

        served.context("HTTP server failed")?;
        let stats = self.container.correlator.stats();
        info!(
            resolved = stats.resolved,
            timed_out = stats.timed_out,
            duplicates = stats.duplicates,
            "Shutdown complete"
        );
        Ok(())
    }
}

/// Completes once the shutdown flag is set.
async fn shutdown_signal(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config().context("Failed to load configuration")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                // The sender must outlive the runtime.
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    let runtime = AgencyRuntime::new(config, shutdown_rx)?;
    runtime.run().await
}
