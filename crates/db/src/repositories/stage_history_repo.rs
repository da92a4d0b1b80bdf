//! Repository for the `lead_stage_history` table.

use leadflow_core::pipeline::LeadStage;
use leadflow_core::types::DbId;
use sqlx::PgPool;

use crate::models::stage_history::StageHistoryEntry;

const COLUMNS: &str = "id, lead_id, from_stage, to_stage, changed_by, changed_at";

/// Append-only log of stage changes.
pub struct StageHistoryRepo;

impl StageHistoryRepo {
    /// Record a stage change inside the caller's transaction.
    pub async fn record(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        lead_id: DbId,
        from: LeadStage,
        to: LeadStage,
        changed_by: Option<DbId>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO lead_stage_history (lead_id, from_stage, to_stage, changed_by) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(lead_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(changed_by)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// History for one lead, oldest first.
    pub async fn list_for_lead(
        pool: &PgPool,
        lead_id: DbId,
    ) -> Result<Vec<StageHistoryEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM lead_stage_history \
             WHERE lead_id = $1 ORDER BY changed_at ASC, id ASC"
        );
        sqlx::query_as::<_, StageHistoryEntry>(&query)
            .bind(lead_id)
            .fetch_all(pool)
            .await
    }
}
