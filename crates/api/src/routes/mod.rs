pub mod dashboard;
pub mod health;
pub mod leads;
pub mod team;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /leads                          list, create
/// /leads/{id}                     get, update
/// /leads/{id}/transitions         advance / close / lose / record show-up
/// /leads/{id}/history             stage history
/// /leads/{id}/assignment          assign closer / setter (admin, HOS)
///
/// /dashboard/pipeline             role-scoped KPIs
/// /dashboard/activity             recent pipeline events (admin, HOS)
///
/// /team                           list (admin, HOS), create (admin)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/leads", leads::router())
        .nest("/dashboard", dashboard::router())
        .nest("/team", team::router())
}
