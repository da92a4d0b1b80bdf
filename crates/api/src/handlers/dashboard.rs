//! Pipeline dashboard handlers.
//!
//! KPIs are computed from the cached lead snapshot, never from a fresh store
//! read. If the last reload failed the previous snapshot is served and the
//! response says so.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use leadflow_core::error::CoreError;
use leadflow_core::kpi::{self, KpiDisplay, PipelineKpis, TimeWindow};
use leadflow_core::paging::clamp_limit;
use leadflow_core::types::Timestamp;
use leadflow_core::visibility::LeadScope;

use crate::error::AppResult;
use crate::middleware::rbac::{RequireManager, RequirePipelineAccess};
use crate::query::{parse_window, DashboardParams};
use crate::response::DataResponse;
use crate::state::AppState;

/// Default number of entries in the activity feed.
const DEFAULT_ACTIVITY_LIMIT: i64 = 20;
const MAX_ACTIVITY_LIMIT: i64 = 100;

#[derive(Debug, Serialize)]
pub struct PipelineDashboard {
    pub window: TimeWindow,
    pub scope: LeadScope,
    pub kpis: PipelineKpis,
    pub display: KpiDisplay,
    /// When the underlying snapshot was loaded.
    pub as_of: Timestamp,
    pub stale: bool,
    pub stale_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// GET /dashboard/pipeline
// ---------------------------------------------------------------------------

/// Role-scoped pipeline KPIs over an optional creation window.
pub async fn pipeline_kpis(
    access: RequirePipelineAccess,
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> AppResult<impl IntoResponse> {
    let window = parse_window(params.window.as_deref())?.unwrap_or_default();

    let mut cache = state.snapshots.cache().current();
    if cache.snapshot.is_none() {
        // Nothing loaded yet; the failure, if any, is recorded in the cache.
        let _ = state.snapshots.refresh().await;
        cache = state.snapshots.cache().current();
    }

    let Some(snapshot) = cache.snapshot.clone() else {
        let reason = cache
            .stale_reason
            .unwrap_or_else(|| "Lead snapshot has not been loaded yet".to_string());
        return Err(CoreError::StoreUnavailable(reason).into());
    };

    let kpis = kpi::aggregate_scoped(&snapshot.leads[..], &access.scope, window, Utc::now());

    if cache.is_stale() {
        tracing::warn!(
            as_of = %snapshot.fetched_at,
            "Serving KPIs from a stale lead snapshot",
        );
    }

    Ok(Json(DataResponse {
        data: PipelineDashboard {
            window,
            scope: access.scope,
            display: kpis.display(),
            kpis,
            as_of: snapshot.fetched_at,
            stale: cache.is_stale(),
            stale_reason: cache.stale_reason,
        },
    }))
}

// ---------------------------------------------------------------------------
// GET /dashboard/activity
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ActivityParams {
    pub limit: Option<i64>,
}

/// Most recent pipeline events. Managers only.
pub async fn recent_activity(
    RequireManager(_user): RequireManager,
    State(state): State<AppState>,
    Query(params): Query<ActivityParams>,
) -> AppResult<impl IntoResponse> {
    let limit = clamp_limit(params.limit, DEFAULT_ACTIVITY_LIMIT, MAX_ACTIVITY_LIMIT);
    let events = state.store.recent_events(limit).await?;
    Ok(Json(DataResponse { data: events }))
}
