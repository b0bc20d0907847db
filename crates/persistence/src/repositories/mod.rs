//! Repository implementations for database access.

pub mod uploaded_file;

pub use uploaded_file::{NewUploadedFile, UploadedFileRepository};
