//! Handlers for the lead pipeline.
//!
//! Every read and write goes through the caller's [`LeadScope`]: a lead the
//! caller may not see is reported as not found. Stage changes are validated
//! by the pure state machine before the store is touched.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use leadflow_core::error::CoreError;
use leadflow_core::paging::{clamp_limit, clamp_offset, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use leadflow_core::pipeline::{self, LeadStage};
use leadflow_core::roles::ActorRole;
use leadflow_core::types::DbId;
use leadflow_core::visibility::LeadScope;
use leadflow_db::models::lead::{
    AssignOwners, CreateLead, Lead, LeadFilter, StageChange, TransitionRequest, UpdateLead,
};
use leadflow_events::{EventKind, PlatformEvent};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::{RequireManager, RequirePipelineAccess};
use crate::query::{parse_stage, parse_window, LeadListParams};
use crate::response::{Created, DataResponse};
use crate::state::AppState;

/// A lead plus the stages it can move to next.
#[derive(Debug, Serialize)]
pub struct LeadDetail {
    #[serde(flatten)]
    pub lead: Lead,
    pub next_stages: Vec<LeadStage>,
}

impl From<Lead> for LeadDetail {
    fn from(lead: Lead) -> Self {
        let next_stages = lead.status.next_stages();
        Self { lead, next_stages }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load a lead the caller is allowed to see.
async fn find_visible(state: &AppState, scope: &LeadScope, id: DbId) -> AppResult<Lead> {
    state
        .store
        .find_lead(id)
        .await?
        .filter(|lead| scope.permits(lead))
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Lead", id }))
}

/// Check that `member_id` is an active member holding `role`.
async fn ensure_owner(state: &AppState, member_id: DbId, role: ActorRole) -> AppResult<()> {
    let member = state
        .store
        .find_team_member(member_id)
        .await?
        .ok_or_else(|| {
            CoreError::Validation(format!("Team member {member_id} does not exist"))
        })?;

    if !member.is_active {
        return Err(CoreError::Validation(format!("Team member {member_id} is inactive")).into());
    }
    if member.role != role {
        return Err(CoreError::Validation(format!(
            "Team member {member_id} is {}, expected {role}",
            member.role
        ))
        .into());
    }
    Ok(())
}

/// Closers and setters own the leads they create; only managers may name
/// other owners.
fn claim_own_slot(user: &AuthUser, input: &mut CreateLead) -> AppResult<()> {
    let (own, other) = match user.role {
        ActorRole::Closer => (&mut input.closer_id, input.setter_id),
        ActorRole::Setter => (&mut input.setter_id, input.closer_id),
        _ => return Ok(()),
    };

    let foreign_owner = other.is_some() || own.is_some_and(|id| id != user.member_id);
    if foreign_owner {
        return Err(CoreError::Forbidden(
            "Only an admin or the head of sales can assign other owners".into(),
        )
        .into());
    }
    *own = Some(user.member_id);
    Ok(())
}

// ---------------------------------------------------------------------------
// GET /leads
// ---------------------------------------------------------------------------

/// List the leads visible to the caller, newest first.
pub async fn list_leads(
    access: RequirePipelineAccess,
    State(state): State<AppState>,
    Query(params): Query<LeadListParams>,
) -> AppResult<impl IntoResponse> {
    let stage = parse_stage(params.stage.as_deref())?;
    let window = parse_window(params.window.as_deref())?;

    let (closer_id, setter_id) = access.scope.owner_filters();
    let filter = LeadFilter {
        closer_id,
        setter_id,
        stage,
        created_since: window.and_then(|w| w.since(Utc::now())),
        limit: clamp_limit(params.limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT),
        offset: clamp_offset(params.offset),
    };

    let leads = state.store.list_leads(&filter).await?;
    Ok(Json(DataResponse { data: leads }))
}

// ---------------------------------------------------------------------------
// POST /leads
// ---------------------------------------------------------------------------

/// Create a lead in the initial stage.
pub async fn create_lead(
    access: RequirePipelineAccess,
    State(state): State<AppState>,
    Json(mut input): Json<CreateLead>,
) -> AppResult<impl IntoResponse> {
    input.check()?;
    claim_own_slot(&access.user, &mut input)?;

    if let Some(closer_id) = input.closer_id {
        ensure_owner(&state, closer_id, ActorRole::Closer).await?;
    }
    if let Some(setter_id) = input.setter_id {
        ensure_owner(&state, setter_id, ActorRole::Setter).await?;
    }

    let lead = state.store.create_lead(&input).await?;

    tracing::info!(
        lead_id = lead.id,
        member_id = access.user.member_id,
        "Lead created",
    );
    state.event_bus.publish(
        PlatformEvent::new(EventKind::LeadCreated)
            .with_lead(lead.id)
            .with_actor(access.user.member_id)
            .with_payload(json!({ "stage": lead.status, "ca": lead.ca })),
    );

    Ok(Created(LeadDetail::from(lead)))
}

// ---------------------------------------------------------------------------
// GET /leads/{id}
// ---------------------------------------------------------------------------

pub async fn get_lead(
    access: RequirePipelineAccess,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let lead = find_visible(&state, &access.scope, id).await?;
    Ok(Json(DataResponse {
        data: LeadDetail::from(lead),
    }))
}

// ---------------------------------------------------------------------------
// PATCH /leads/{id}
// ---------------------------------------------------------------------------

/// Edit contact details, classification or deal value.
pub async fn update_lead(
    access: RequirePipelineAccess,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateLead>,
) -> AppResult<impl IntoResponse> {
    input.check()?;
    if input.is_empty() {
        return Err(AppError::BadRequest("No fields to update".into()));
    }
    find_visible(&state, &access.scope, id).await?;

    let lead = state
        .store
        .update_lead(id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Lead", id }))?;

    tracing::info!(lead_id = id, member_id = access.user.member_id, "Lead updated");
    state.event_bus.publish(
        PlatformEvent::new(EventKind::LeadUpdated)
            .with_lead(id)
            .with_actor(access.user.member_id),
    );

    Ok(Json(DataResponse {
        data: LeadDetail::from(lead),
    }))
}

// ---------------------------------------------------------------------------
// POST /leads/{id}/transitions
// ---------------------------------------------------------------------------

/// Advance, close, lose, or record the appointment outcome of a lead.
///
/// Rejected transitions answer 422 and leave the lead untouched. A lead
/// changed by someone else since it was read answers 409.
pub async fn transition_lead(
    access: RequirePipelineAccess,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(req): Json<TransitionRequest>,
) -> AppResult<impl IntoResponse> {
    let lead = find_visible(&state, &access.scope, id).await?;
    let outcome = pipeline::apply(lead.state(), req.transition)?;

    let entering_appointment = outcome.changes_stage() && outcome.to == LeadStage::RdvPlanifie;
    if req.rdv_date.is_some() && !entering_appointment {
        return Err(CoreError::Validation(format!(
            "rdv_date is only accepted when moving into {}",
            LeadStage::RdvPlanifie
        ))
        .into());
    }

    let change = StageChange {
        outcome,
        rdv_date: req.rdv_date,
        expected_updated_at: req.expected_updated_at,
        changed_by: Some(access.user.member_id),
    };
    let updated = state.store.transition_lead(id, &change).await?;

    tracing::info!(
        lead_id = id,
        member_id = access.user.member_id,
        action = req.transition.name(),
        from = %outcome.from,
        to = %outcome.to,
        "Lead transition applied",
    );

    let kind = if outcome.changes_stage() {
        EventKind::LeadStageChanged
    } else {
        EventKind::LeadUpdated
    };
    state.event_bus.publish(
        PlatformEvent::new(kind)
            .with_lead(id)
            .with_actor(access.user.member_id)
            .with_payload(json!({
                "action": req.transition.name(),
                "from": outcome.from,
                "to": outcome.to,
                "show_up": outcome.show_up,
            })),
    );

    Ok(Json(DataResponse {
        data: LeadDetail::from(updated),
    }))
}

// ---------------------------------------------------------------------------
// GET /leads/{id}/history
// ---------------------------------------------------------------------------

pub async fn lead_history(
    access: RequirePipelineAccess,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    find_visible(&state, &access.scope, id).await?;
    let history = state.store.stage_history(id).await?;
    Ok(Json(DataResponse { data: history }))
}

// ---------------------------------------------------------------------------
// PUT /leads/{id}/assignment
// ---------------------------------------------------------------------------

/// Assign a closer and/or setter. Filled slots cannot be overwritten.
pub async fn assign_owners(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<AssignOwners>,
) -> AppResult<impl IntoResponse> {
    if input.closer_id.is_none() && input.setter_id.is_none() {
        return Err(AppError::BadRequest(
            "Provide closer_id and/or setter_id".into(),
        ));
    }
    if let Some(closer_id) = input.closer_id {
        ensure_owner(&state, closer_id, ActorRole::Closer).await?;
    }
    if let Some(setter_id) = input.setter_id {
        ensure_owner(&state, setter_id, ActorRole::Setter).await?;
    }

    let lead = state.store.assign_owners(id, &input).await?;

    tracing::info!(
        lead_id = id,
        member_id = user.member_id,
        closer_id = ?lead.closer_id,
        setter_id = ?lead.setter_id,
        "Lead owners assigned",
    );
    state.event_bus.publish(
        PlatformEvent::new(EventKind::LeadAssigned)
            .with_lead(id)
            .with_actor(user.member_id)
            .with_payload(json!({
                "closer_id": lead.closer_id,
                "setter_id": lead.setter_id,
            })),
    );

    Ok(Json(DataResponse {
        data: LeadDetail::from(lead),
    }))
}
