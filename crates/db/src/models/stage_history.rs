//! Stage history model.

use leadflow_core::pipeline::LeadStage;
use leadflow_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `lead_stage_history` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct StageHistoryEntry {
    pub id: DbId,
    pub lead_id: DbId,
    #[sqlx(try_from = "String")]
    pub from_stage: LeadStage,
    #[sqlx(try_from = "String")]
    pub to_stage: LeadStage,
    pub changed_by: Option<DbId>,
    pub changed_at: Timestamp,
}
