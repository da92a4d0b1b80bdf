//! Authentication primitives.
//!
//! Access tokens are issued by the hosted identity provider; this service
//! only validates them.

pub mod jwt;
