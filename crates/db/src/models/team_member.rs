//! Team member entity model and DTOs.

use leadflow_core::error::CoreError;
use leadflow_core::lead::{validate_optional_text, MAX_NAME_LENGTH};
use leadflow_core::roles::ActorRole;
use leadflow_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `team_members` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct TeamMember {
    pub id: DbId,
    pub name: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub role: ActorRole,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a team member.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTeamMember {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub role: ActorRole,
}

impl CreateTeamMember {
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        validate_optional_text("name", Some(&self.name), MAX_NAME_LENGTH)
    }
}
