//! Domain model definitions.

pub mod enrichment;
pub mod file;
pub mod preview;

pub use enrichment::{
    EnrichmentAccepted, EnrichmentRequest, JobSnapshot, JobStatus, JobStatusResponse,
};
pub use file::{format_file_size, FileResponse, UploadedFile};
pub use preview::{FilePreview, PreviewQuery};
