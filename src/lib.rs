//! # SAP Service Layer Session Library
//!
//! Keeps one always-valid session token for the external ERP backend:
//! renews it ahead of expiry, persists it atomically and coalesces
//! concurrent renewals into a single authentication round-trip.
//!
//! Modules:
//! - `session`: token model, expiry policy, token store and the manager
//! - `sources`: the authentication exchange
//! - `parser`: extracting the token and its lifetime from a login response
//! - `config`: service configuration, loading and validation
//! - `server`: HTTP routes exposing the token to collaborators

pub mod config;
pub mod helpers;
pub mod observability;
pub mod parser;
pub mod resilience;
pub mod server;
pub mod session;
pub mod sources;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::config::sources::*;
pub use crate::session::{SessionError, SessionManager, Token};
