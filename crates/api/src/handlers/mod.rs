pub mod dashboard;
pub mod leads;
pub mod team;
