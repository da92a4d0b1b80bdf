//! The lead store seam.
//!
//! Handlers and background tasks talk to a [`PipelineStore`] rather than to
//! the repositories directly, so the HTTP and event layers can run against
//! [`MemoryPipelineStore`] in tests and against [`PgPipelineStore`] in
//! production.

mod memory;
mod postgres;

use async_trait::async_trait;
use leadflow_core::error::CoreError;
use leadflow_core::types::DbId;

use crate::models::event::{NewPipelineEvent, PipelineEvent};
use crate::models::lead::{AssignOwners, CreateLead, Lead, LeadFilter, StageChange, UpdateLead};
use crate::models::stage_history::StageHistoryEntry;
use crate::models::team_member::{CreateTeamMember, TeamMember};

pub use memory::MemoryPipelineStore;
pub use postgres::PgPipelineStore;

/// PostgreSQL SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Errors raised by a [`PipelineStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store did not answer (pool exhausted, connection lost). Retryable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// The row changed under the caller, or a unique value is taken.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
            sqlx::Error::Database(ref db_err)
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                let constraint = db_err.constraint().unwrap_or("unknown");
                StoreError::Conflict(format!(
                    "Duplicate value violates unique constraint: {constraint}"
                ))
            }
            other => StoreError::Database(other),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => CoreError::StoreUnavailable(msg),
            StoreError::NotFound { entity, id } => CoreError::NotFound { entity, id },
            StoreError::Conflict(msg) => CoreError::Conflict(msg),
            StoreError::Database(e) => CoreError::Internal(e.to_string()),
        }
    }
}

/// Persistence operations the pipeline needs.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Cheap round-trip proving the store answers.
    async fn health_check(&self) -> Result<(), StoreError>;

    async fn create_lead(&self, input: &CreateLead) -> Result<Lead, StoreError>;

    async fn find_lead(&self, id: DbId) -> Result<Option<Lead>, StoreError>;

    /// Leads matching `filter`, newest first.
    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, StoreError>;

    /// The full lead collection, for the KPI snapshot.
    async fn all_leads(&self) -> Result<Vec<Lead>, StoreError>;

    /// Returns `None` when the lead does not exist.
    async fn update_lead(&self, id: DbId, input: &UpdateLead)
        -> Result<Option<Lead>, StoreError>;

    /// Apply a validated stage change and append its history row atomically.
    ///
    /// Fails with [`StoreError::Conflict`] when the lead's stage or
    /// `updated_at` no longer match what the caller validated against.
    async fn transition_lead(&self, id: DbId, change: &StageChange) -> Result<Lead, StoreError>;

    /// Fill empty owner slots. Fails with [`StoreError::Conflict`] when a
    /// requested slot already holds another member.
    async fn assign_owners(&self, id: DbId, input: &AssignOwners) -> Result<Lead, StoreError>;

    async fn stage_history(&self, lead_id: DbId) -> Result<Vec<StageHistoryEntry>, StoreError>;

    async fn create_team_member(&self, input: &CreateTeamMember)
        -> Result<TeamMember, StoreError>;

    async fn find_team_member(&self, id: DbId) -> Result<Option<TeamMember>, StoreError>;

    async fn list_team_members(&self) -> Result<Vec<TeamMember>, StoreError>;

    async fn record_event(&self, event: &NewPipelineEvent) -> Result<PipelineEvent, StoreError>;

    async fn recent_events(&self, limit: i64) -> Result<Vec<PipelineEvent>, StoreError>;
}
