//! Domain layer for the Visitor Gate backend.
//!
//! This crate contains:
//! - Domain models (Visitor, VisitRequest, BlacklistEntry, Notification, UserAccount)
//! - The transactional storage contract and an in-memory implementation
//! - Business logic services (visit workflow, blacklist ledger, credentials,
//!   notification fan-out, inbox, account approval)
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use error::VisitError;
