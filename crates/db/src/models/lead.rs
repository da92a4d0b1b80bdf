//! Lead entity model and DTOs.

use leadflow_core::error::CoreError;
use leadflow_core::lead::{
    validate_ca, validate_optional_text, PipelineRecord, Temperature, MAX_NAME_LENGTH,
};
use leadflow_core::pipeline::{LeadStage, LeadState, Transition, TransitionOutcome};
use leadflow_core::types::{DbId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `leads` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Lead {
    pub id: DbId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub activite: Option<String>,
    #[sqlx(try_from = "String")]
    pub temperature: Temperature,
    pub ca: Decimal,
    #[sqlx(try_from = "String")]
    pub status: LeadStage,
    pub show_up: Option<bool>,
    pub rdv_date: Option<Timestamp>,
    pub closer_id: Option<DbId>,
    pub setter_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Lead {
    /// Lifecycle fields fed to the state machine.
    pub fn state(&self) -> LeadState {
        LeadState {
            stage: self.status,
            show_up: self.show_up,
        }
    }
}

impl PipelineRecord for Lead {
    fn stage(&self) -> LeadStage {
        self.status
    }

    fn ca(&self) -> Decimal {
        self.ca
    }

    fn show_up(&self) -> Option<bool> {
        self.show_up
    }

    fn temperature(&self) -> Temperature {
        self.temperature
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn closer_id(&self) -> Option<DbId> {
        self.closer_id
    }

    fn setter_id(&self) -> Option<DbId> {
        self.setter_id
    }
}

/// DTO for creating a new lead. New leads always start in `NOUVEAU`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateLead {
    #[validate(length(min = 1, max = 200))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 40))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub activite: Option<String>,
    pub temperature: Option<Temperature>,
    pub ca: Option<Decimal>,
    pub closer_id: Option<DbId>,
    pub setter_id: Option<DbId>,
}

impl CreateLead {
    /// Field rules plus the domain checks `validator` cannot express.
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        validate_optional_text("first_name", self.first_name.as_deref(), MAX_NAME_LENGTH)?;
        validate_optional_text("last_name", self.last_name.as_deref(), MAX_NAME_LENGTH)?;
        if let Some(ca) = self.ca {
            validate_ca(ca)?;
        }
        Ok(())
    }
}

/// DTO for editing contact, classification and deal value.
///
/// Stage and owners are deliberately absent: they change through
/// transitions and assignment only.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateLead {
    #[validate(length(min = 1, max = 200))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 40))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub activite: Option<String>,
    pub temperature: Option<Temperature>,
    pub ca: Option<Decimal>,
}

impl UpdateLead {
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        validate_optional_text("first_name", self.first_name.as_deref(), MAX_NAME_LENGTH)?;
        validate_optional_text("last_name", self.last_name.as_deref(), MAX_NAME_LENGTH)?;
        if let Some(ca) = self.ca {
            validate_ca(ca)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.activite.is_none()
            && self.temperature.is_none()
            && self.ca.is_none()
    }
}

/// Body of `POST /leads/{id}/transitions`.
///
/// ```json
/// { "action": "record_show_up", "attended": false }
/// { "action": "advance", "rdv_date": "2026-04-02T09:00:00Z" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    #[serde(flatten)]
    pub transition: Transition,
    /// Appointment date, accepted when advancing into `RDV_PLANIFIE`.
    pub rdv_date: Option<Timestamp>,
    /// The `updated_at` the caller last read. When present, the write only
    /// succeeds if nobody touched the lead since.
    pub expected_updated_at: Option<Timestamp>,
}

/// A validated stage change, ready for the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageChange {
    pub outcome: TransitionOutcome,
    pub rdv_date: Option<Timestamp>,
    pub expected_updated_at: Option<Timestamp>,
    pub changed_by: Option<DbId>,
}

/// Body of `PUT /leads/{id}/assignment`. Slots left `None` are untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignOwners {
    pub closer_id: Option<DbId>,
    pub setter_id: Option<DbId>,
}

/// Store-level filter for lead listings.
///
/// `closer_id` / `setter_id` carry the caller's visibility scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadFilter {
    pub closer_id: Option<DbId>,
    pub setter_id: Option<DbId>,
    pub stage: Option<LeadStage>,
    pub created_since: Option<Timestamp>,
    pub limit: i64,
    pub offset: i64,
}

impl LeadFilter {
    /// Whether `lead` passes every predicate except pagination.
    pub fn matches(&self, lead: &Lead) -> bool {
        self.closer_id.map_or(true, |id| lead.closer_id == Some(id))
            && self.setter_id.map_or(true, |id| lead.setter_id == Some(id))
            && self.stage.map_or(true, |s| lead.status == s)
            && self.created_since.map_or(true, |since| lead.created_at >= since)
    }
}
