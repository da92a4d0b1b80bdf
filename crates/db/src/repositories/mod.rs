//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod lead_repo;
pub mod pipeline_event_repo;
pub mod stage_history_repo;
pub mod team_member_repo;

pub use lead_repo::LeadRepo;
pub use pipeline_event_repo::PipelineEventRepo;
pub use stage_history_repo::StageHistoryRepo;
pub use team_member_repo::TeamMemberRepo;
