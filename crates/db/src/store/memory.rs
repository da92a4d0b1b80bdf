use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use leadflow_core::lead::Temperature;
use leadflow_core::pipeline::LeadStage;
use leadflow_core::types::DbId;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::{PipelineStore, StoreError};
use crate::models::event::{NewPipelineEvent, PipelineEvent};
use crate::models::lead::{AssignOwners, CreateLead, Lead, LeadFilter, StageChange, UpdateLead};
use crate::models::stage_history::StageHistoryEntry;
use crate::models::team_member::{CreateTeamMember, TeamMember};

#[derive(Default)]
struct Tables {
    next_id: DbId,
    leads: Vec<Lead>,
    members: Vec<TeamMember>,
    history: Vec<StageHistoryEntry>,
    events: Vec<PipelineEvent>,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn lead_mut(&mut self, id: DbId) -> Result<&mut Lead, StoreError> {
        self.leads
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(StoreError::NotFound { entity: "Lead", id })
    }
}

/// In-process [`PipelineStore`] for tests and local runs without a database.
///
/// Mirrors the conditional-write semantics of the Postgres store. It can be
/// switched offline to exercise `Unavailable` handling.
#[derive(Default)]
pub struct MemoryPipelineStore {
    tables: Mutex<Tables>,
    offline: AtomicBool,
    full_reads: AtomicU64,
}

impl MemoryPipelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of [`PipelineStore::all_leads`] calls served so far.
    pub fn full_reads(&self) -> u64 {
        self.full_reads.load(Ordering::SeqCst)
    }

    /// Insert a lead as-is apart from its id. Lets tests seed arbitrary
    /// stages and creation dates.
    pub async fn insert_lead(&self, mut lead: Lead) -> Lead {
        let mut tables = self.tables.lock().await;
        lead.id = tables.next_id();
        tables.leads.push(lead.clone());
        lead
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }
}

fn newest_first(leads: &mut [Lead]) {
    leads.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl PipelineStore for MemoryPipelineStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.ensure_online()
    }

    async fn create_lead(&self, input: &CreateLead) -> Result<Lead, StoreError> {
        self.ensure_online()?;
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let lead = Lead {
            id: tables.next_id(),
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            activite: input.activite.clone(),
            temperature: input.temperature.unwrap_or(Temperature::Cold),
            ca: input.ca.unwrap_or(Decimal::ZERO),
            status: LeadStage::INITIAL,
            show_up: None,
            rdv_date: None,
            closer_id: input.closer_id,
            setter_id: input.setter_id,
            created_at: now,
            updated_at: now,
        };
        tables.leads.push(lead.clone());
        Ok(lead)
    }

    async fn find_lead(&self, id: DbId) -> Result<Option<Lead>, StoreError> {
        self.ensure_online()?;
        let tables = self.tables.lock().await;
        Ok(tables.leads.iter().find(|l| l.id == id).cloned())
    }

    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, StoreError> {
        self.ensure_online()?;
        let tables = self.tables.lock().await;
        let mut matching: Vec<Lead> = tables
            .leads
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        newest_first(&mut matching);
        Ok(matching
            .into_iter()
            .skip(usize::try_from(filter.offset).unwrap_or(0))
            .take(usize::try_from(filter.limit).unwrap_or(0))
            .collect())
    }

    async fn all_leads(&self) -> Result<Vec<Lead>, StoreError> {
        self.ensure_online()?;
        self.full_reads.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().await;
        let mut leads = tables.leads.clone();
        newest_first(&mut leads);
        Ok(leads)
    }

    async fn update_lead(
        &self,
        id: DbId,
        input: &UpdateLead,
    ) -> Result<Option<Lead>, StoreError> {
        self.ensure_online()?;
        let mut tables = self.tables.lock().await;
        let Some(lead) = tables.leads.iter_mut().find(|l| l.id == id) else {
            return Ok(None);
        };
        if let Some(v) = &input.first_name {
            lead.first_name = Some(v.clone());
        }
        if let Some(v) = &input.last_name {
            lead.last_name = Some(v.clone());
        }
        if let Some(v) = &input.email {
            lead.email = Some(v.clone());
        }
        if let Some(v) = &input.phone {
            lead.phone = Some(v.clone());
        }
        if let Some(v) = &input.activite {
            lead.activite = Some(v.clone());
        }
        if let Some(t) = input.temperature {
            lead.temperature = t;
        }
        if let Some(ca) = input.ca {
            lead.ca = ca;
        }
        lead.updated_at = Utc::now();
        Ok(Some(lead.clone()))
    }

    async fn transition_lead(&self, id: DbId, change: &StageChange) -> Result<Lead, StoreError> {
        self.ensure_online()?;
        let mut tables = self.tables.lock().await;
        let lead = tables.lead_mut(id)?;

        let stale_stage = lead.status != change.outcome.from;
        let stale_version = change
            .expected_updated_at
            .is_some_and(|expected| expected != lead.updated_at);
        if stale_stage || stale_version {
            tracing::info!(
                lead_id = id,
                current_stage = %lead.status,
                stale_stage,
                stale_version,
                "Conditional write missed: lead changed underneath",
            );
            return Err(StoreError::Conflict(
                "Lead was modified concurrently; reload and retry".into(),
            ));
        }

        let now = Utc::now();
        lead.status = change.outcome.to;
        lead.show_up = change.outcome.show_up;
        if change.rdv_date.is_some() {
            lead.rdv_date = change.rdv_date;
        }
        lead.updated_at = now;
        let updated = lead.clone();

        if change.outcome.changes_stage() {
            let entry = StageHistoryEntry {
                id: tables.next_id(),
                lead_id: id,
                from_stage: change.outcome.from,
                to_stage: change.outcome.to,
                changed_by: change.changed_by,
                changed_at: now,
            };
            tables.history.push(entry);
        }
        Ok(updated)
    }

    async fn assign_owners(&self, id: DbId, input: &AssignOwners) -> Result<Lead, StoreError> {
        self.ensure_online()?;
        let mut tables = self.tables.lock().await;
        let lead = tables.lead_mut(id)?;

        let taken = |current: Option<DbId>, requested: Option<DbId>| match (current, requested) {
            (Some(c), Some(r)) => c != r,
            _ => false,
        };
        if taken(lead.closer_id, input.closer_id) || taken(lead.setter_id, input.setter_id) {
            return Err(StoreError::Conflict(
                "Lead already has a different owner in that slot".into(),
            ));
        }

        if input.closer_id.is_some() {
            lead.closer_id = input.closer_id;
        }
        if input.setter_id.is_some() {
            lead.setter_id = input.setter_id;
        }
        lead.updated_at = Utc::now();
        Ok(lead.clone())
    }

    async fn stage_history(&self, lead_id: DbId) -> Result<Vec<StageHistoryEntry>, StoreError> {
        self.ensure_online()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .history
            .iter()
            .filter(|h| h.lead_id == lead_id)
            .cloned()
            .collect())
    }

    async fn create_team_member(
        &self,
        input: &CreateTeamMember,
    ) -> Result<TeamMember, StoreError> {
        self.ensure_online()?;
        let mut tables = self.tables.lock().await;
        let email = input.email.to_lowercase();
        if tables.members.iter().any(|m| m.email.to_lowercase() == email) {
            return Err(StoreError::Conflict(
                "Duplicate value violates unique constraint: uq_team_members_email".into(),
            ));
        }
        let now = Utc::now();
        let member = TeamMember {
            id: tables.next_id(),
            name: input.name.trim().to_string(),
            email: input.email.clone(),
            role: input.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.members.push(member.clone());
        Ok(member)
    }

    async fn find_team_member(&self, id: DbId) -> Result<Option<TeamMember>, StoreError> {
        self.ensure_online()?;
        let tables = self.tables.lock().await;
        Ok(tables.members.iter().find(|m| m.id == id).cloned())
    }

    async fn list_team_members(&self) -> Result<Vec<TeamMember>, StoreError> {
        self.ensure_online()?;
        let tables = self.tables.lock().await;
        let mut members = tables.members.clone();
        members.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(members)
    }

    async fn record_event(&self, event: &NewPipelineEvent) -> Result<PipelineEvent, StoreError> {
        self.ensure_online()?;
        let mut tables = self.tables.lock().await;
        let row = PipelineEvent {
            id: tables.next_id(),
            event_type: event.event_type.clone(),
            lead_id: event.lead_id,
            actor_id: event.actor_id,
            payload: event.payload.clone(),
            created_at: Utc::now(),
        };
        tables.events.push(row.clone());
        Ok(row)
    }

    async fn recent_events(&self, limit: i64) -> Result<Vec<PipelineEvent>, StoreError> {
        self.ensure_online()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .events
            .iter()
            .rev()
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use leadflow_core::pipeline::{apply, Transition};
    use leadflow_core::roles::ActorRole;

    use super::*;

    async fn transition(
        store: &MemoryPipelineStore,
        lead: &Lead,
        t: Transition,
    ) -> Result<Lead, StoreError> {
        let outcome = apply(lead.state(), t).unwrap();
        let change = StageChange {
            outcome,
            rdv_date: None,
            expected_updated_at: Some(lead.updated_at),
            changed_by: Some(1),
        };
        store.transition_lead(lead.id, &change).await
    }

    #[tokio::test]
    async fn created_leads_start_new_and_cold() {
        let store = MemoryPipelineStore::new();
        let lead = store.create_lead(&CreateLead::default()).await.unwrap();
        assert_eq!(lead.status, LeadStage::Nouveau);
        assert_eq!(lead.temperature, Temperature::Cold);
        assert_eq!(lead.ca, Decimal::ZERO);
    }

    #[tokio::test]
    async fn transition_records_history() {
        let store = MemoryPipelineStore::new();
        let lead = store.create_lead(&CreateLead::default()).await.unwrap();
        let lead = transition(&store, &lead, Transition::Advance).await.unwrap();
        assert_eq!(lead.status, LeadStage::Contacte);

        let history = store.stage_history(lead.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_stage, LeadStage::Nouveau);
        assert_eq!(history[0].to_stage, LeadStage::Contacte);
        assert_eq!(history[0].changed_by, Some(1));
    }

    #[tokio::test]
    async fn stale_read_is_a_conflict_and_writes_nothing() {
        let store = MemoryPipelineStore::new();
        let original = store.create_lead(&CreateLead::default()).await.unwrap();

        transition(&store, &original, Transition::MarkLost).await.unwrap();
        // Second writer still holds the pre-transition copy.
        assert_matches!(
            transition(&store, &original, Transition::MarkClosed).await,
            Err(StoreError::Conflict(_))
        );

        let current = store.find_lead(original.id).await.unwrap().unwrap();
        assert_eq!(current.status, LeadStage::Perdu);
        assert_eq!(store.stage_history(original.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transition_on_missing_lead_is_not_found() {
        let store = MemoryPipelineStore::new();
        let lead = store.create_lead(&CreateLead::default()).await.unwrap();
        let change = StageChange {
            outcome: apply(lead.state(), Transition::Advance).unwrap(),
            rdv_date: None,
            expected_updated_at: None,
            changed_by: None,
        };
        assert_matches!(
            store.transition_lead(999, &change).await,
            Err(StoreError::NotFound { entity: "Lead", id: 999 })
        );
    }

    #[tokio::test]
    async fn owners_are_assigned_once() {
        let store = MemoryPipelineStore::new();
        let lead = store.create_lead(&CreateLead::default()).await.unwrap();

        let assign = |closer| AssignOwners {
            closer_id: Some(closer),
            setter_id: None,
        };
        let lead = store.assign_owners(lead.id, &assign(7)).await.unwrap();
        assert_eq!(lead.closer_id, Some(7));

        // Re-assigning the same member is a no-op, a different one conflicts.
        assert!(store.assign_owners(lead.id, &assign(7)).await.is_ok());
        assert_matches!(
            store.assign_owners(lead.id, &assign(8)).await,
            Err(StoreError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn list_applies_filter_and_pagination() {
        let store = MemoryPipelineStore::new();
        for closer in [1, 2, 1, 1] {
            let input = CreateLead {
                closer_id: Some(closer),
                ..Default::default()
            };
            store.create_lead(&input).await.unwrap();
        }
        let filter = LeadFilter {
            closer_id: Some(1),
            limit: 2,
            ..Default::default()
        };
        let page = store.list_leads(&filter).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|l| l.closer_id == Some(1)));
        assert!(page[0].id > page[1].id);
    }

    #[tokio::test]
    async fn duplicate_member_email_conflicts() {
        let store = MemoryPipelineStore::new();
        let input = CreateTeamMember {
            name: "Sam".into(),
            email: "sam@example.com".into(),
            role: ActorRole::Setter,
        };
        store.create_team_member(&input).await.unwrap();
        let dup = CreateTeamMember {
            email: "SAM@example.com".into(),
            ..input
        };
        assert_matches!(
            store.create_team_member(&dup).await,
            Err(StoreError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn offline_store_is_unavailable() {
        let store = MemoryPipelineStore::new();
        store.set_offline(true);
        assert_matches!(store.health_check().await, Err(StoreError::Unavailable(_)));
        assert_matches!(store.all_leads().await, Err(StoreError::Unavailable(_)));
        store.set_offline(false);
        assert!(store.health_check().await.is_ok());
    }
}
