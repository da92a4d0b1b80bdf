//! Repository for the `pipeline_events` table.

use sqlx::PgPool;

use crate::models::event::{NewPipelineEvent, PipelineEvent};

const COLUMNS: &str = "id, event_type, lead_id, actor_id, payload, created_at";

/// Durable log of pipeline events published on the bus.
pub struct PipelineEventRepo;

impl PipelineEventRepo {
    pub async fn insert(
        pool: &PgPool,
        input: &NewPipelineEvent,
    ) -> Result<PipelineEvent, sqlx::Error> {
        let query = format!(
            "INSERT INTO pipeline_events (event_type, lead_id, actor_id, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PipelineEvent>(&query)
            .bind(&input.event_type)
            .bind(input.lead_id)
            .bind(input.actor_id)
            .bind(&input.payload)
            .fetch_one(pool)
            .await
    }

    /// Most recent events first.
    pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<PipelineEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pipeline_events ORDER BY created_at DESC, id DESC LIMIT $1"
        );
        sqlx::query_as::<_, PipelineEvent>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
