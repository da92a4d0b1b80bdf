//! Lead classification types, field limits, and the read-only view of a
//! lead that filtering and aggregation work on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::pipeline::LeadStage;
use crate::types::{DbId, Money, Timestamp};

/* --------------------------------------------------------------------------
Constants
-------------------------------------------------------------------------- */

/// Maximum length for first / last name.
pub const MAX_NAME_LENGTH: usize = 200;

/// Maximum length for the free-text business activity.
pub const MAX_ACTIVITE_LENGTH: usize = 200;

/// Maximum length for a phone number as typed by the user.
pub const MAX_PHONE_LENGTH: usize = 40;

/* --------------------------------------------------------------------------
Temperature
-------------------------------------------------------------------------- */

/// Sales-urgency signal. Independent of the pipeline stage.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Temperature {
    Hot,
    Warm,
    #[default]
    Cold,
}

pub const ALL_TEMPERATURES: [Temperature; 3] =
    [Temperature::Hot, Temperature::Warm, Temperature::Cold];

impl Temperature {
    pub const fn as_str(self) -> &'static str {
        match self {
            Temperature::Hot => "HOT",
            Temperature::Warm => "WARM",
            Temperature::Cold => "COLD",
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Temperature {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_TEMPERATURES
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid temperature '{s}'. Must be one of: HOT, WARM, COLD"
                ))
            })
    }
}

impl TryFrom<String> for Temperature {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/* --------------------------------------------------------------------------
Record view
-------------------------------------------------------------------------- */

/// The fields of a lead that visibility filtering and KPI aggregation read.
///
/// Implemented by the persisted lead row so that `core` stays free of any
/// storage types.
pub trait PipelineRecord {
    fn stage(&self) -> LeadStage;
    fn ca(&self) -> Money;
    fn show_up(&self) -> Option<bool>;
    fn temperature(&self) -> Temperature;
    fn created_at(&self) -> Timestamp;
    fn closer_id(&self) -> Option<DbId>;
    fn setter_id(&self) -> Option<DbId>;
}

/* --------------------------------------------------------------------------
Validation functions
-------------------------------------------------------------------------- */

/// Deal value must be zero or positive.
pub fn validate_ca(ca: Money) -> Result<(), CoreError> {
    if ca.is_sign_negative() && !ca.is_zero() {
        return Err(CoreError::Validation(format!(
            "Deal value (ca) must not be negative, got {ca}"
        )));
    }
    Ok(())
}

/// Reject blank-but-present text and over-long values.
pub fn validate_optional_text(
    field: &str,
    value: Option<&str>,
    max_len: usize,
) -> Result<(), CoreError> {
    let Some(v) = value else {
        return Ok(());
    };
    if v.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be blank")));
    }
    if v.chars().count() > max_len {
        return Err(CoreError::Validation(format!(
            "{field} exceeds maximum length of {max_len} characters"
        )));
    }
    Ok(())
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
