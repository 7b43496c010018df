//! # jobtrail_core
//!
//! Core domain logic for Jobtrail.

pub mod auth;
pub mod mailer;
pub mod migrate;
pub mod models;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
