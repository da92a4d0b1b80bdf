//! Persisted pipeline event model.

use leadflow_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `pipeline_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PipelineEvent {
    pub id: DbId,
    pub event_type: String,
    pub lead_id: Option<DbId>,
    pub actor_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}

/// DTO for recording an event.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPipelineEvent {
    pub event_type: String,
    pub lead_id: Option<DbId>,
    pub actor_id: Option<DbId>,
    pub payload: serde_json::Value,
}
