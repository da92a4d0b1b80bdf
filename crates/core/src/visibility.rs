//! Role-scoped visibility over the lead collection.
//!
//! Every read path (listing, detail, KPI aggregation) goes through a
//! [`LeadScope`] first, so counts and sums are never computed over leads
//! the actor may not see.

use serde::Serialize;

use crate::error::CoreError;
use crate::lead::PipelineRecord;
use crate::roles::ActorRole;
use crate::types::DbId;

/// The staff member making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: DbId,
    pub role: ActorRole,
}

/// Which leads an actor may see and act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "member_id", rename_all = "snake_case")]
pub enum LeadScope {
    /// Admins and the head of sales.
    All,
    /// Leads whose `closer_id` is this member.
    Closer(DbId),
    /// Leads whose `setter_id` is this member.
    Setter(DbId),
}

impl LeadScope {
    /// Derive the scope for `actor`.
    ///
    /// Experts work on client files, not on the sales pipeline, and get
    /// [`CoreError::Forbidden`].
    pub fn for_actor(actor: &Actor) -> Result<Self, CoreError> {
        match actor.role {
            ActorRole::Admin | ActorRole::Hos => Ok(LeadScope::All),
            ActorRole::Closer => Ok(LeadScope::Closer(actor.id)),
            ActorRole::Setter => Ok(LeadScope::Setter(actor.id)),
            ActorRole::Expert => Err(CoreError::Forbidden(
                "Experts do not have access to the lead pipeline".into(),
            )),
        }
    }

    /// Whether a lead with these owners is visible under this scope.
    pub fn permits_owners(&self, closer_id: Option<DbId>, setter_id: Option<DbId>) -> bool {
        match *self {
            LeadScope::All => true,
            LeadScope::Closer(id) => closer_id == Some(id),
            LeadScope::Setter(id) => setter_id == Some(id),
        }
    }

    pub fn permits<R: PipelineRecord>(&self, record: &R) -> bool {
        self.permits_owners(record.closer_id(), record.setter_id())
    }

    /// Owner filters to push down into a store query: `(closer_id, setter_id)`.
    pub fn owner_filters(&self) -> (Option<DbId>, Option<DbId>) {
        match *self {
            LeadScope::All => (None, None),
            LeadScope::Closer(id) => (Some(id), None),
            LeadScope::Setter(id) => (None, Some(id)),
        }
    }
}

/// Keep only the records visible under `scope`, preserving order.
pub fn filter_visible<'a, R: PipelineRecord>(
    scope: &LeadScope,
    records: impl IntoIterator<Item = &'a R>,
) -> Vec<&'a R>
where
    R: 'a,
{
    records.into_iter().filter(|r| scope.permits(*r)).collect()
}
