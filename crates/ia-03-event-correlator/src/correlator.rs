//! # Event Correlator
//!
//! Bridges "dispatch now, hear back later" into a single awaitable call.
//!
//! Flow:
//! 1. A caller dispatches an operation and learns its correlation id
//! 2. The caller registers a wait for that id
//! 3. The bus pump calls `deliver()` for every incoming event
//! 4. The caller's wait completes with the event, or times out
//!
//! A wait is claimed by whoever removes its entry from the registry. Event
//! delivery and the timeout both try; the loser finds nothing to remove and
//! does nothing, so each wait resolves exactly once.

use crate::config::CorrelatorConfig;
use crate::error::CorrelationError;
use crate::recent::RecentlyResolved;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_bus::{AgentEvent, Subscription};
use shared_types::CorrelationId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

/// What `deliver` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The event completed a wait.
    Resolved { order: Option<usize> },
    /// The id was resolved recently; the event was dropped.
    Duplicate,
    /// Nobody is waiting on the id; the event was dropped.
    Unmatched,
}

/// Correlator counters.
#[derive(Debug, Default)]
pub struct CorrelatorStats {
    pub registered: AtomicU64,
    pub resolved: AtomicU64,
    pub timed_out: AtomicU64,
    pub duplicates: AtomicU64,
    pub unmatched: AtomicU64,
    /// Registrations refused because the id was already awaited.
    pub rejected: AtomicU64,
    /// Waits dropped or cancelled before resolution.
    pub cancelled: AtomicU64,
}

/// Point-in-time copy of [`CorrelatorStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelatorStatsSnapshot {
    pub registered: u64,
    pub resolved: u64,
    pub timed_out: u64,
    pub duplicates: u64,
    pub unmatched: u64,
    pub rejected: u64,
    pub cancelled: u64,
}

struct Waiter {
    sender: oneshot::Sender<AgentEvent>,
    token: u64,
    order: Option<usize>,
    registered_at: Instant,
}

struct Inner {
    pending: DashMap<CorrelationId, Waiter>,
    recent: RecentlyResolved,
    stats: CorrelatorStats,
    next_token: AtomicU64,
    config: CorrelatorConfig,
}

impl Inner {
    /// Remove the entry only if it still belongs to the registration `token`.
    fn claim(&self, id: &CorrelationId, token: u64) -> Option<Waiter> {
        self.pending
            .remove_if(id, |_, waiter| waiter.token == token)
            .map(|(_, waiter)| waiter)
    }
}

/// Registry of waits keyed by correlation id.
///
/// Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct EventCorrelator {
    inner: Arc<Inner>,
}

impl EventCorrelator {
    pub fn new(config: CorrelatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: DashMap::new(),
                recent: RecentlyResolved::new(config.resolved_retention),
                stats: CorrelatorStats::default(),
                next_token: AtomicU64::new(0),
                config,
            }),
        }
    }

    /// Register a wait for `correlation_id`.
    ///
    /// The wait is live from this call on: an event delivered before
    /// [`PendingWait::wait`] is polled is kept for it.
    pub fn register(
        &self,
        correlation_id: impl Into<CorrelationId>,
        order: Option<usize>,
        timeout: Duration,
    ) -> Result<PendingWait, CorrelationError> {
        let correlation_id = correlation_id.into();
        let (sender, receiver) = oneshot::channel();
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);

        match self.inner.pending.entry(correlation_id.clone()) {
            Entry::Occupied(_) => {
                self.inner.stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(correlation_id = %correlation_id, "Wait already registered for id");
                return Err(CorrelationError::AlreadyRegistered(correlation_id));
            }
            Entry::Vacant(slot) => {
                slot.insert(Waiter {
                    sender,
                    token,
                    order,
                    registered_at: Instant::now(),
                });
            }
        }

        self.inner.stats.registered.fetch_add(1, Ordering::Relaxed);
        debug!(
            correlation_id = %correlation_id,
            order = ?order,
            timeout_ms = timeout.as_millis() as u64,
            "Registered wait"
        );

        Ok(PendingWait {
            inner: self.inner.clone(),
            correlation_id,
            order,
            timeout,
            token,
            receiver,
            settled: false,
        })
    }

    /// Register and wait in one step.
    ///
    /// `on_match` turns the matching event into the caller's result.
    pub async fn subscribe_and_wait<T, F>(
        &self,
        correlation_id: impl Into<CorrelationId>,
        timeout: Duration,
        on_match: F,
    ) -> Result<T, CorrelationError>
    where
        F: FnOnce(AgentEvent) -> T,
    {
        self.register(correlation_id, None, timeout)?
            .wait(on_match)
            .await
    }

    /// [`Self::subscribe_and_wait`] with the configured default timeout.
    pub async fn subscribe_and_wait_default<T, F>(
        &self,
        correlation_id: impl Into<CorrelationId>,
        on_match: F,
    ) -> Result<T, CorrelationError>
    where
        F: FnOnce(AgentEvent) -> T,
    {
        let timeout = self.inner.config.default_timeout;
        self.subscribe_and_wait(correlation_id, timeout, on_match)
            .await
    }

    /// Hand an incoming event to whoever waits on its id.
    pub fn deliver(&self, event: AgentEvent) -> Delivery {
        let correlation_id = event.correlation_id.clone();

        if let Some((_, waiter)) = self.inner.pending.remove(&correlation_id) {
            self.inner.recent.mark(correlation_id.clone());
            self.inner.stats.resolved.fetch_add(1, Ordering::Relaxed);

            let state = event.state.clone();
            if waiter.sender.send(event).is_err() {
                // Waiter dropped between the claim and the send.
                debug!(correlation_id = %correlation_id, "Waiter gone before delivery");
            }
            debug!(
                correlation_id = %correlation_id,
                order = ?waiter.order,
                state = %state,
                waited_ms = waiter.registered_at.elapsed().as_millis() as u64,
                "Resolved wait"
            );
            return Delivery::Resolved {
                order: waiter.order,
            };
        }

        if self.inner.recent.contains(&correlation_id) {
            self.inner.stats.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %correlation_id, "Duplicate event dropped");
            Delivery::Duplicate
        } else {
            self.inner.stats.unmatched.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = %correlation_id,
                topic = ?event.topic,
                "Unmatched event dropped"
            );
            Delivery::Unmatched
        }
    }

    /// Pump `subscription` into [`Self::deliver`] until the bus closes or
    /// `shutdown` flips to `true`.
    pub async fn run(&self, mut subscription: Subscription, mut shutdown: watch::Receiver<bool>) {
        info!("Event correlator started");

        loop {
            tokio::select! {
                event = subscription.recv() => match event {
                    Some(event) => {
                        self.deliver(event);
                    }
                    None => {
                        warn!("Event bus closed, stopping correlator");
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(active_waits = self.active_waits(), "Event correlator stopping");
                        break;
                    }
                }
            }
        }
    }

    /// Drop every active wait. Waiters observe [`CorrelationError::Closed`].
    pub fn cancel_all(&self) -> usize {
        let count = self.inner.pending.len();
        self.inner.pending.clear();
        self.inner
            .stats
            .cancelled
            .fetch_add(count as u64, Ordering::Relaxed);
        if count > 0 {
            warn!(cancelled = count, "Cancelled active waits");
        }
        count
    }

    /// Number of unresolved waits.
    pub fn active_waits(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn is_waiting(&self, correlation_id: &CorrelationId) -> bool {
        self.inner.pending.contains_key(correlation_id)
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> CorrelatorStatsSnapshot {
        let stats = &self.inner.stats;
        CorrelatorStatsSnapshot {
            registered: stats.registered.load(Ordering::Relaxed),
            resolved: stats.resolved.load(Ordering::Relaxed),
            timed_out: stats.timed_out.load(Ordering::Relaxed),
            duplicates: stats.duplicates.load(Ordering::Relaxed),
            unmatched: stats.unmatched.load(Ordering::Relaxed),
            rejected: stats.rejected.load(Ordering::Relaxed),
            cancelled: stats.cancelled.load(Ordering::Relaxed),
        }
    }
}

impl Default for EventCorrelator {
    fn default() -> Self {
        Self::new(CorrelatorConfig::default())
    }
}

/// A registered wait. Dropping it unregisters the id.
pub struct PendingWait {
    inner: Arc<Inner>,
    correlation_id: CorrelationId,
    order: Option<usize>,
    timeout: Duration,
    token: u64,
    receiver: oneshot::Receiver<AgentEvent>,
    settled: bool,
}

impl PendingWait {
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn order(&self) -> Option<usize> {
        self.order
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for the matching event and map it through `on_match`.
    pub async fn wait<T, F>(mut self, on_match: F) -> Result<T, CorrelationError>
    where
        F: FnOnce(AgentEvent) -> T,
    {
        self.settle().await.map(on_match)
    }

    async fn settle(&mut self) -> Result<AgentEvent, CorrelationError> {
        let outcome = match tokio::time::timeout(self.timeout, &mut self.receiver).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_)) => Err(CorrelationError::Closed(self.correlation_id.clone())),
            Err(_) => {
                if self.inner.claim(&self.correlation_id, self.token).is_some() {
                    self.inner.recent.mark(self.correlation_id.clone());
                    self.inner.stats.timed_out.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        correlation_id = %self.correlation_id,
                        order = ?self.order,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Wait timed out"
                    );
                    Err(CorrelationError::TimedOut {
                        correlation_id: self.correlation_id.clone(),
                        timeout: self.timeout,
                    })
                } else {
                    // Delivery claimed the entry first; the event is in the channel.
                    (&mut self.receiver)
                        .await
                        .map_err(|_| CorrelationError::Closed(self.correlation_id.clone()))
                }
            }
        };
        self.settled = true;
        outcome
    }
}

impl Drop for PendingWait {
    fn drop(&mut self) {
        if !self.settled && self.inner.claim(&self.correlation_id, self.token).is_some() {
            self.inner.stats.cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %self.correlation_id, "Wait dropped before resolution");
        }
    }
}
