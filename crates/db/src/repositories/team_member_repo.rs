//! Repository for the `team_members` table.

use leadflow_core::types::DbId;
use sqlx::PgPool;

use crate::models::team_member::{CreateTeamMember, TeamMember};

const COLUMNS: &str = "id, name, email, role, is_active, created_at, updated_at";

/// Provides CRUD operations for team members.
pub struct TeamMemberRepo;

impl TeamMemberRepo {
    /// Insert a new member, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateTeamMember) -> Result<TeamMember, sqlx::Error> {
        let query = format!(
            "INSERT INTO team_members (name, email, role) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TeamMember>(&query)
            .bind(input.name.trim())
            .bind(&input.email)
            .bind(input.role.as_str())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<TeamMember>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM team_members WHERE id = $1");
        sqlx::query_as::<_, TeamMember>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all members ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<TeamMember>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM team_members ORDER BY name ASC, id ASC");
        sqlx::query_as::<_, TeamMember>(&query).fetch_all(pool).await
    }
}
