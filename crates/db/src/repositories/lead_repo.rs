//! Repository for the `leads` table.

use leadflow_core::pipeline::LeadStage;
use leadflow_core::types::DbId;
use sqlx::PgPool;

use crate::models::lead::{AssignOwners, CreateLead, Lead, LeadFilter, StageChange, UpdateLead};
use crate::repositories::StageHistoryRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, first_name, last_name, email, phone, activite, temperature, ca, \
    status, show_up, rdv_date, closer_id, setter_id, created_at, updated_at";

/// Provides CRUD and lifecycle operations for leads.
pub struct LeadRepo;

impl LeadRepo {
    /// Insert a new lead in the initial stage, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateLead) -> Result<Lead, sqlx::Error> {
        let query = format!(
            "INSERT INTO leads \
                (first_name, last_name, email, phone, activite, temperature, ca, \
                 status, closer_id, setter_id) \
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'COLD'), COALESCE($7, 0), $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Lead>(&query)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.activite)
            .bind(input.temperature.map(|t| t.as_str()))
            .bind(input.ca)
            .bind(LeadStage::INITIAL.as_str())
            .bind(input.closer_id)
            .bind(input.setter_id)
            .fetch_one(pool)
            .await
    }

    /// Find a lead by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Lead>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM leads WHERE id = $1");
        sqlx::query_as::<_, Lead>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List leads matching `filter`, newest first.
    pub async fn list(pool: &PgPool, filter: &LeadFilter) -> Result<Vec<Lead>, sqlx::Error> {
        let mut conditions: Vec<String> = Vec::new();
        let mut param_idx: usize = 1;

        if filter.closer_id.is_some() {
            conditions.push(format!("closer_id = ${param_idx}"));
            param_idx += 1;
        }
        if filter.setter_id.is_some() {
            conditions.push(format!("setter_id = ${param_idx}"));
            param_idx += 1;
        }
        if filter.stage.is_some() {
            conditions.push(format!("status = ${param_idx}"));
            param_idx += 1;
        }
        if filter.created_since.is_some() {
            conditions.push(format!("created_at >= ${param_idx}"));
            param_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM leads {where_clause} \
             ORDER BY created_at DESC, id DESC \
             LIMIT ${param_idx} OFFSET ${}",
            param_idx + 1
        );

        let mut q = sqlx::query_as::<_, Lead>(&query);

        if let Some(closer_id) = filter.closer_id {
            q = q.bind(closer_id);
        }
        if let Some(setter_id) = filter.setter_id {
            q = q.bind(setter_id);
        }
        if let Some(stage) = filter.stage {
            q = q.bind(stage.as_str());
        }
        if let Some(since) = filter.created_since {
            q = q.bind(since);
        }
        q = q.bind(filter.limit).bind(filter.offset);

        q.fetch_all(pool).await
    }

    /// Every lead, newest first. Feeds the KPI snapshot.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Lead>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM leads ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, Lead>(&query).fetch_all(pool).await
    }

    /// Update contact and classification fields. Only non-`None` fields are
    /// applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateLead,
    ) -> Result<Option<Lead>, sqlx::Error> {
        let query = format!(
            "UPDATE leads SET \
                first_name = COALESCE($2, first_name), \
                last_name = COALESCE($3, last_name), \
                email = COALESCE($4, email), \
                phone = COALESCE($5, phone), \
                activite = COALESCE($6, activite), \
                temperature = COALESCE($7, temperature), \
                ca = COALESCE($8, ca), \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Lead>(&query)
            .bind(id)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.activite)
            .bind(input.temperature.map(|t| t.as_str()))
            .bind(input.ca)
            .fetch_optional(pool)
            .await
    }

    /// Persist a validated stage change and its history row atomically.
    ///
    /// The update is conditional on the stage the caller validated against
    /// and, when given, on the `updated_at` the caller read. Returns `None`
    /// when the row is missing or no longer matches; nothing is written in
    /// that case.
    pub async fn apply_stage_change(
        pool: &PgPool,
        id: DbId,
        change: &StageChange,
    ) -> Result<Option<Lead>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE leads SET \
                status = $2, \
                show_up = $3, \
                rdv_date = COALESCE($4, rdv_date), \
                updated_at = NOW() \
             WHERE id = $1 \
               AND status = $5 \
               AND ($6::timestamptz IS NULL OR updated_at = $6) \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Lead>(&query)
            .bind(id)
            .bind(change.outcome.to.as_str())
            .bind(change.outcome.show_up)
            .bind(change.rdv_date)
            .bind(change.outcome.from.as_str())
            .bind(change.expected_updated_at)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(lead) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        if change.outcome.changes_stage() {
            StageHistoryRepo::record(
                &mut tx,
                id,
                change.outcome.from,
                change.outcome.to,
                change.changed_by,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(Some(lead))
    }

    /// Fill empty owner slots. A slot already holding a different member
    /// is never overwritten.
    ///
    /// Returns `None` if the lead is missing or a requested slot is taken.
    pub async fn assign_owners(
        pool: &PgPool,
        id: DbId,
        input: &AssignOwners,
    ) -> Result<Option<Lead>, sqlx::Error> {
        let query = format!(
            "UPDATE leads SET \
                closer_id = COALESCE($2, closer_id), \
                setter_id = COALESCE($3, setter_id), \
                updated_at = NOW() \
             WHERE id = $1 \
               AND ($2::bigint IS NULL OR closer_id IS NULL OR closer_id = $2) \
               AND ($3::bigint IS NULL OR setter_id IS NULL OR setter_id = $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Lead>(&query)
            .bind(id)
            .bind(input.closer_id)
            .bind(input.setter_id)
            .fetch_optional(pool)
            .await
    }
}
