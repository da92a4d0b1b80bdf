pub mod event;
pub mod lead;
pub mod stage_history;
pub mod team_member;
