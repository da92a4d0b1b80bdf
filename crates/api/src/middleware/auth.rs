//! Caller identity from the `Authorization: Bearer` header.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use leadflow_core::error::CoreError;
use leadflow_core::roles::ActorRole;
use leadflow_core::types::DbId;
use leadflow_core::visibility::Actor;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// The team member a request acts for. Rejects with 401 when the token is
/// missing, malformed, expired or names a role Leadflow does not know.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub member_id: DbId,
    pub role: ActorRole,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.member_id,
            role: self.role,
        }
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError::Core(CoreError::Unauthorized(message.into()))
}

/// The raw token. The scheme is matched case-insensitively.
fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let value = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| unauthorized("Authorization header is not valid ASCII"))?;

    value
        .split_once(' ')
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| unauthorized("Expected `Authorization: Bearer <token>`"))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let claims = validate_token(token, &state.config.jwt).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            unauthorized("Invalid or expired token")
        })?;

        let role = claims
            .role
            .parse::<ActorRole>()
            .map_err(|_| unauthorized(format!("Token carries unknown role '{}'", claims.role)))?;

        Ok(AuthUser {
            member_id: claims.sub,
            role,
        })
    }
}
