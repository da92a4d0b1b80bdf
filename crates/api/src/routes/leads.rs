//! Route definitions for leads.
//!
//! Mounted at `/leads` by `api_routes()`.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::leads;
use crate::state::AppState;

/// Lead routes.
///
/// ```text
/// GET    /                    -> list_leads
/// POST   /                    -> create_lead
/// GET    /{id}                -> get_lead
/// PATCH  /{id}                -> update_lead
/// POST   /{id}/transitions    -> transition_lead
/// GET    /{id}/history        -> lead_history
/// PUT    /{id}/assignment     -> assign_owners (admin, HOS)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(leads::list_leads).post(leads::create_lead))
        .route("/{id}", get(leads::get_lead).patch(leads::update_lead))
        .route("/{id}/transitions", post(leads::transition_lead))
        .route("/{id}/history", get(leads::lead_history))
        .route("/{id}/assignment", put(leads::assign_owners))
}
