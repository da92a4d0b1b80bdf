//! Cached lead collection for KPI reads.
//!
//! [`SnapshotRefresher`] keeps an immutable copy of every lead in a
//! [`SnapshotCache`]. It reloads on lead events from the bus and on a fixed
//! interval. Dashboards read the cache, filter it by role and reduce it; they
//! never hit the store on the read path.
//!
//! A failed reload keeps the previous snapshot and marks the cache stale
//! with the failure reason.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leadflow_core::types::Timestamp;
use leadflow_db::models::lead::Lead;
use leadflow_db::{PipelineStore, StoreError};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_util::sync::CancellationToken;

use crate::bus::PlatformEvent;

/// Default period between unconditional reloads.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// One successfully loaded copy of the lead collection.
#[derive(Debug)]
pub struct LeadSnapshot {
    pub leads: Arc<[Lead]>,
    pub fetched_at: Timestamp,
}

/// What readers see: the last good snapshot, if any, and why it is stale.
#[derive(Debug, Clone, Default)]
pub struct CacheState {
    pub snapshot: Option<Arc<LeadSnapshot>>,
    /// Set when the most recent reload failed.
    pub stale_reason: Option<String>,
}

impl CacheState {
    pub fn is_stale(&self) -> bool {
        self.stale_reason.is_some()
    }
}

/// Single-writer, many-reader holder for the current [`CacheState`].
pub struct SnapshotCache {
    state: watch::Sender<CacheState>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        let (state, _) = watch::channel(CacheState::default());
        Self { state }
    }

    /// Cheap clone of the current state.
    pub fn current(&self) -> CacheState {
        self.state.borrow().clone()
    }

    /// Replace the snapshot and clear any stale marker.
    pub fn publish(&self, leads: Vec<Lead>) {
        let snapshot = Arc::new(LeadSnapshot {
            leads: leads.into(),
            fetched_at: Utc::now(),
        });
        self.state.send_replace(CacheState {
            snapshot: Some(snapshot),
            stale_reason: None,
        });
    }

    /// Keep the last snapshot but flag it stale.
    pub fn mark_stale(&self, reason: String) {
        self.state.send_modify(|state| state.stale_reason = Some(reason));
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Refresher
// ---------------------------------------------------------------------------

/// Reloads the [`SnapshotCache`] from the store.
pub struct SnapshotRefresher {
    store: Arc<dyn PipelineStore>,
    cache: SnapshotCache,
    in_flight: Mutex<()>,
}

impl SnapshotRefresher {
    pub fn new(store: Arc<dyn PipelineStore>) -> Self {
        Self {
            store,
            cache: SnapshotCache::new(),
            in_flight: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Reload the full lead collection once.
    ///
    /// Concurrent callers queue behind a single in-flight reload.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        let _guard = self.in_flight.lock().await;
        match self.store.all_leads().await {
            Ok(leads) => {
                tracing::debug!(lead_count = leads.len(), "Lead snapshot refreshed");
                self.cache.publish(leads);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Lead snapshot refresh failed, serving stale data");
                self.cache.mark_stale(e.to_string());
                Err(e)
            }
        }
    }

    /// Run the refresh loop until `cancel` fires or the bus closes.
    ///
    /// Loads once at start-up. A burst of lead events already queued on
    /// `receiver` is drained and answered with a single reload.
    pub async fn run(
        self: Arc<Self>,
        mut receiver: broadcast::Receiver<PlatformEvent>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        tracing::info!(
            interval_secs = interval.as_secs(),
            "Lead snapshot refresher started"
        );

        let _ = self.refresh().await;

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately and the initial load is done.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Lead snapshot refresher stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let _ = self.refresh().await;
                }
                received = receiver.recv() => {
                    let (mut dirty, mut closed) = match received {
                        Ok(event) => (event.touches_leads(), false),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Snapshot refresher lagged behind the bus");
                            (true, false)
                        }
                        Err(RecvError::Closed) => (false, true),
                    };

                    let drained = drain_pending(&mut receiver);
                    dirty |= drained.dirty;
                    closed |= drained.closed;

                    if dirty {
                        let _ = self.refresh().await;
                    }
                    if closed {
                        tracing::info!("Event bus closed, snapshot refresher shutting down");
                        break;
                    }
                }
            }
        }
    }
}

struct Drained {
    dirty: bool,
    closed: bool,
}

/// Consume every event already queued without waiting.
fn drain_pending(receiver: &mut broadcast::Receiver<PlatformEvent>) -> Drained {
    let mut drained = Drained {
        dirty: false,
        closed: false,
    };
    loop {
        match receiver.try_recv() {
            Ok(event) => drained.dirty |= event.touches_leads(),
            Err(TryRecvError::Lagged(_)) => drained.dirty = true,
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Closed) => {
                drained.closed = true;
                break;
            }
        }
    }
    drained
}
