//! Team roles.
//!
//! The string constants must match the `CHECK` constraint on
//! `team_members.role` and the `role` claim issued in access tokens.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const ROLE_ADMIN: &str = "ADMIN";
pub const ROLE_HOS: &str = "HOS";
pub const ROLE_CLOSER: &str = "CLOSER";
pub const ROLE_SETTER: &str = "SETTER";
pub const ROLE_EXPERT: &str = "EXPERT";

/// All valid role values.
pub const VALID_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_HOS, ROLE_CLOSER, ROLE_SETTER, ROLE_EXPERT];

/// Role of a staff member acting on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Admin,
    /// Head of sales.
    Hos,
    Closer,
    Setter,
    Expert,
}

impl ActorRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            ActorRole::Admin => ROLE_ADMIN,
            ActorRole::Hos => ROLE_HOS,
            ActorRole::Closer => ROLE_CLOSER,
            ActorRole::Setter => ROLE_SETTER,
            ActorRole::Expert => ROLE_EXPERT,
        }
    }

    /// Admins and the head of sales supervise the whole pipeline.
    pub const fn is_manager(self) -> bool {
        matches!(self, ActorRole::Admin | ActorRole::Hos)
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ROLE_ADMIN => Ok(ActorRole::Admin),
            ROLE_HOS => Ok(ActorRole::Hos),
            ROLE_CLOSER => Ok(ActorRole::Closer),
            ROLE_SETTER => Ok(ActorRole::Setter),
            ROLE_EXPERT => Ok(ActorRole::Expert),
            other => Err(CoreError::Validation(format!(
                "Invalid role '{other}'. Must be one of: {}",
                VALID_ROLES.join(", ")
            ))),
        }
    }
}

impl TryFrom<String> for ActorRole {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
