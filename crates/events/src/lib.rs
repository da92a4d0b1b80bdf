//! Lead pipeline event bus and the background services that consume it.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`] / [`EventKind`]: the envelope published on every
//!   pipeline change.
//! - [`EventPersistence`]: writes every event to `pipeline_events`.
//! - [`SnapshotRefresher`]: keeps the cached lead collection that KPI reads
//!   are served from.

pub mod bus;
pub mod persistence;
pub mod snapshot;

pub use bus::{EventBus, EventKind, PlatformEvent};
pub use persistence::EventPersistence;
pub use snapshot::{CacheState, LeadSnapshot, SnapshotCache, SnapshotRefresher};
