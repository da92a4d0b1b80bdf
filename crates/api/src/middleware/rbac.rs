//! Role gates layered on top of [`AuthUser`].
//!
//! A failed gate is a 403; a missing or bad token is still a 401.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use leadflow_core::error::CoreError;
use leadflow_core::roles::ActorRole;
use leadflow_core::visibility::LeadScope;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

async fn authorize(
    parts: &mut Parts,
    state: &AppState,
    allowed: fn(ActorRole) -> bool,
    denied: &str,
) -> Result<AuthUser, AppError> {
    let user = AuthUser::from_request_parts(parts, state).await?;
    if allowed(user.role) {
        Ok(user)
    } else {
        tracing::debug!(member_id = user.member_id, role = %user.role, "Role gate refused request");
        Err(AppError::Core(CoreError::Forbidden(denied.to_string())))
    }
}

/// Team administration.
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authorize(parts, state, |role| role == ActorRole::Admin, "Admin role required")
            .await
            .map(RequireAdmin)
    }
}

/// Admins and heads of sales: assignment, the team list and the activity feed.
pub struct RequireManager(pub AuthUser);

impl FromRequestParts<AppState> for RequireManager {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authorize(
            parts,
            state,
            ActorRole::is_manager,
            "Admin or head of sales role required",
        )
        .await
        .map(RequireManager)
    }
}

/// Any role that works the pipeline, with its lead visibility scope.
/// Experts get 403 from [`LeadScope::for_actor`].
pub struct RequirePipelineAccess {
    pub user: AuthUser,
    pub scope: LeadScope,
}

impl FromRequestParts<AppState> for RequirePipelineAccess {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        let scope = LeadScope::for_actor(&user.actor())?;
        Ok(RequirePipelineAccess { user, scope })
    }
}
