//! Query parameter types for API handlers.
//!
//! Enum-valued parameters are kept as text and parsed in the handler, so an
//! unknown value gets the JSON error body instead of a plain-text extractor
//! rejection.

use leadflow_core::kpi::TimeWindow;
use leadflow_core::pipeline::LeadStage;
use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// `GET /leads?stage=&window=&limit=&offset=`.
#[derive(Debug, Default, Deserialize)]
pub struct LeadListParams {
    pub stage: Option<String>,
    pub window: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /dashboard/pipeline?window=`.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub window: Option<String>,
}

pub fn parse_stage(raw: Option<&str>) -> AppResult<Option<LeadStage>> {
    raw.map(str::parse::<LeadStage>)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

pub fn parse_window(raw: Option<&str>) -> AppResult<Option<TimeWindow>> {
    raw.map(str::parse::<TimeWindow>)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}
