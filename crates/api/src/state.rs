use std::sync::Arc;

use leadflow_db::PipelineStore;
use leadflow_events::{EventBus, SnapshotRefresher};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Lead and team persistence (Postgres in production).
    pub store: Arc<dyn PipelineStore>,
    pub config: Arc<ServerConfig>,
    /// Every lead change is published here.
    pub event_bus: Arc<EventBus>,
    /// Cached lead collection that KPI reads are served from.
    pub snapshots: Arc<SnapshotRefresher>,
}
