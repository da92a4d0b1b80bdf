//! Team member handlers.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use leadflow_db::models::team_member::CreateTeamMember;
use leadflow_events::{EventKind, PlatformEvent};

use crate::error::AppResult;
use crate::middleware::rbac::{RequireAdmin, RequireManager};
use crate::response::{Created, DataResponse};
use crate::state::AppState;

/// GET /team
pub async fn list_members(
    RequireManager(_user): RequireManager,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let members = state.store.list_team_members().await?;
    Ok(Json(DataResponse { data: members }))
}

/// POST /team
pub async fn create_member(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CreateTeamMember>,
) -> AppResult<impl IntoResponse> {
    input.check()?;
    let member = state.store.create_team_member(&input).await?;

    tracing::info!(
        new_member_id = member.id,
        role = %member.role,
        admin_id = admin.member_id,
        "Team member created",
    );
    state.event_bus.publish(
        PlatformEvent::new(EventKind::TeamMemberCreated)
            .with_actor(admin.member_id)
            .with_payload(json!({ "member_id": member.id, "role": member.role })),
    );

    Ok(Created(member))
}
