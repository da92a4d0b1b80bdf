//! Route definitions for dashboards.
//!
//! Mounted at `/dashboard` by `api_routes()`.

use axum::routing::get;
use axum::Router;

use crate::handlers::dashboard;
use crate::state::AppState;

/// ```text
/// GET /pipeline    -> pipeline_kpis
/// GET /activity    -> recent_activity (admin, HOS)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pipeline", get(dashboard::pipeline_kpis))
        .route("/activity", get(dashboard::recent_activity))
}
