//! # IA-02 Readiness Gate
//!
//! Blocks startup until the upstream agent answers its readiness probe.
//! There is no attempt limit: the agency is useless without the agent, so it
//! waits as long as it takes (or until shutdown is requested).

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

/// Default pause between probe attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Probe failure. Treated the same as "not ready".
#[derive(Debug, Clone, Error)]
#[error("readiness probe failed: {0}")]
pub struct ProbeError(pub String);

/// Something that can say whether the agent is ready.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn is_ready(&self) -> Result<bool, ProbeError>;
}

#[async_trait]
impl<P: ReadinessProbe + ?Sized> ReadinessProbe for Arc<P> {
    async fn is_ready(&self) -> Result<bool, ProbeError> {
        (**self).is_ready().await
    }
}

/// How long the gate held startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessReport {
    /// Probe calls made, including the successful one.
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Poll `probe` every `poll_interval` until it reports ready.
pub async fn wait_until_ready<P>(poll_interval: Duration, probe: &P) -> ReadinessReport
where
    P: ReadinessProbe + ?Sized,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match probe.is_ready().await {
            Ok(true) => {
                let report = ReadinessReport {
                    attempts,
                    elapsed: started.elapsed(),
                };
                info!(
                    attempts = report.attempts,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Agent is ready"
                );
                return report;
            }
            Ok(false) => debug!(attempt = attempts, "Agent not ready yet"),
            Err(e) => debug!(attempt = attempts, error = %e, "Agent readiness probe failed"),
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Readiness wait that gives up when `shutdown` flips to `true`.
///
/// Returns `None` when shutdown won.
pub async fn wait_until_ready_or_shutdown<P>(
    poll_interval: Duration,
    probe: &P,
    mut shutdown: watch::Receiver<bool>,
) -> Option<ReadinessReport>
where
    P: ReadinessProbe + ?Sized,
{
    if *shutdown.borrow() {
        return None;
    }

    tokio::select! {
        report = wait_until_ready(poll_interval, probe) => Some(report),
        _ = async {
            // A dropped sender means nobody can request shutdown anymore.
            loop {
                if shutdown.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
                if *shutdown.borrow() {
                    break;
                }
            }
        } => {
            info!("Shutdown requested while waiting for agent");
            None
        }
    }
}

/// Interval and probe bundled for wiring.
pub struct ReadinessGate<P: ReadinessProbe> {
    probe: P,
    poll_interval: Duration,
}

impl<P: ReadinessProbe> ReadinessGate<P> {
    pub fn new(probe: P, poll_interval: Duration) -> Self {
        Self {
            probe,
            poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn wait(&self) -> ReadinessReport {
        wait_until_ready(self.poll_interval, &self.probe).await
    }

    pub async fn wait_or_shutdown(&self, shutdown: watch::Receiver<bool>) -> Option<ReadinessReport> {
        wait_until_ready_or_shutdown(self.poll_interval, &self.probe, shutdown).await
    }
}
