//! Domain logic for the commercial lead pipeline.
//!
//! This crate has no I/O: the stage state machine, role-scoped visibility
//! and KPI aggregation are plain functions over plain data, shared by the
//! storage, event and HTTP layers.

pub mod error;
pub mod kpi;
pub mod lead;
pub mod paging;
pub mod pipeline;
pub mod roles;
pub mod types;
pub mod visibility;
