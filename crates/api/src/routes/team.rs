//! Route definitions for team members.
//!
//! Mounted at `/team` by `api_routes()`.

use axum::routing::get;
use axum::Router;

use crate::handlers::team;
use crate::state::AppState;

/// ```text
/// GET    /    -> list_members (admin, HOS)
/// POST   /    -> create_member (admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(team::list_members).post(team::create_member))
}
