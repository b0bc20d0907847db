//! Database entity definitions.

pub mod uploaded_file;

pub use uploaded_file::UploadedFileEntity;
