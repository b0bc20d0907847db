//! Domain layer for the Tabfuse backend.
//!
//! This crate contains:
//! - Domain models (UploadedFile, EnrichmentRequest, JobSnapshot)
//! - Request/response payloads with validation rules

pub mod models;
