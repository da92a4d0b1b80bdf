use async_trait::async_trait;
use leadflow_core::types::DbId;
use sqlx::PgPool;

use super::{PipelineStore, StoreError};
use crate::models::event::{NewPipelineEvent, PipelineEvent};
use crate::models::lead::{AssignOwners, CreateLead, Lead, LeadFilter, StageChange, UpdateLead};
use crate::models::stage_history::StageHistoryEntry;
use crate::models::team_member::{CreateTeamMember, TeamMember};
use crate::repositories::{LeadRepo, PipelineEventRepo, StageHistoryRepo, TeamMemberRepo};

/// [`PipelineStore`] backed by PostgreSQL through the sqlx repositories.
#[derive(Clone)]
pub struct PgPipelineStore {
    pool: PgPool,
}

impl PgPipelineStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Turn a failed conditional write into `NotFound` or `Conflict`.
    async fn explain_missed_write(&self, id: DbId, conflict: &str) -> StoreError {
        match LeadRepo::find_by_id(&self.pool, id).await {
            Ok(None) => {
                tracing::debug!(lead_id = id, "Conditional write missed: lead does not exist");
                StoreError::NotFound { entity: "Lead", id }
            }
            Ok(Some(current)) => {
                tracing::info!(
                    lead_id = id,
                    current_stage = %current.status,
                    updated_at = %current.updated_at,
                    reason = conflict,
                    "Conditional write missed: lead changed underneath",
                );
                StoreError::Conflict(conflict.to_string())
            }
            Err(e) => {
                tracing::warn!(lead_id = id, error = %e, "Could not explain missed write");
                e.into()
            }
        }
    }
}

#[async_trait]
impl PipelineStore for PgPipelineStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    async fn create_lead(&self, input: &CreateLead) -> Result<Lead, StoreError> {
        Ok(LeadRepo::create(&self.pool, input).await?)
    }

    async fn find_lead(&self, id: DbId) -> Result<Option<Lead>, StoreError> {
        Ok(LeadRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, StoreError> {
        Ok(LeadRepo::list(&self.pool, filter).await?)
    }

    async fn all_leads(&self) -> Result<Vec<Lead>, StoreError> {
        Ok(LeadRepo::list_all(&self.pool).await?)
    }

    async fn update_lead(
        &self,
        id: DbId,
        input: &UpdateLead,
    ) -> Result<Option<Lead>, StoreError> {
        Ok(LeadRepo::update(&self.pool, id, input).await?)
    }

    async fn transition_lead(&self, id: DbId, change: &StageChange) -> Result<Lead, StoreError> {
        match LeadRepo::apply_stage_change(&self.pool, id, change).await? {
            Some(lead) => Ok(lead),
            None => Err(self
                .explain_missed_write(id, "Lead was modified concurrently; reload and retry")
                .await),
        }
    }

    async fn assign_owners(&self, id: DbId, input: &AssignOwners) -> Result<Lead, StoreError> {
        match LeadRepo::assign_owners(&self.pool, id, input).await? {
            Some(lead) => Ok(lead),
            None => Err(self
                .explain_missed_write(id, "Lead already has a different owner in that slot")
                .await),
        }
    }

    async fn stage_history(&self, lead_id: DbId) -> Result<Vec<StageHistoryEntry>, StoreError> {
        Ok(StageHistoryRepo::list_for_lead(&self.pool, lead_id).await?)
    }

    async fn create_team_member(
        &self,
        input: &CreateTeamMember,
    ) -> Result<TeamMember, StoreError> {
        Ok(TeamMemberRepo::create(&self.pool, input).await?)
    }

    async fn find_team_member(&self, id: DbId) -> Result<Option<TeamMember>, StoreError> {
        Ok(TeamMemberRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_team_members(&self) -> Result<Vec<TeamMember>, StoreError> {
        Ok(TeamMemberRepo::list(&self.pool).await?)
    }

    async fn record_event(&self, event: &NewPipelineEvent) -> Result<PipelineEvent, StoreError> {
        Ok(PipelineEventRepo::insert(&self.pool, event).await?)
    }

    async fn recent_events(&self, limit: i64) -> Result<Vec<PipelineEvent>, StoreError> {
        Ok(PipelineEventRepo::list_recent(&self.pool, limit).await?)
    }
}
