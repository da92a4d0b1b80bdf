//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- the team member behind a JWT Bearer token.
//! - [`rbac::RequireAdmin`] -- requires the `ADMIN` role.
//! - [`rbac::RequireManager`] -- requires `ADMIN` or `HOS`.
//! - [`rbac::RequirePipelineAccess`] -- any role that works the pipeline,
//!   together with its lead visibility scope.

pub mod auth;
pub mod rbac;
