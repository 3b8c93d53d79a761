//! Shared utilities and common types for the Visitor Gate backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Cryptographic utilities (hashing, gate credential generation)
//! - JWT validation for authenticated actor descriptors
//! - Common validation logic (phone normalization, free-text fields)

pub mod crypto;
pub mod jwt;
pub mod validation;
