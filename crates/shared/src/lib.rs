//! Shared utilities and common types for the Tabfuse backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Page-number pagination math
//! - Common validation logic

pub mod pagination;
pub mod validation;
