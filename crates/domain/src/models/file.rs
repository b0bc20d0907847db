//! Uploaded-file domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A CSV file stored in the catalog.
///
/// Immutable once created apart from deletion; enriched outputs are new
/// rows linked to their source via `parent_file_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: i64,
    pub original_name: String,
    pub storage_path: String,
    pub file_size: i64,
    pub columns: Option<Vec<String>>,
    pub is_enriched: bool,
    pub parent_file_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// File metadata returned by the upload and listing endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct FileResponse {
    pub id: i64,
    pub original_name: String,
    pub file_size: i64,
    pub file_size_formatted: String,
    pub columns: Option<Vec<String>>,
    pub is_enriched: bool,
    pub parent_file_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<UploadedFile> for FileResponse {
    fn from(file: UploadedFile) -> Self {
        Self {
            id: file.id,
            original_name: file.original_name,
            file_size_formatted: format_file_size(file.file_size),
            file_size: file.file_size,
            columns: file.columns,
            is_enriched: file.is_enriched,
            parent_file_id: file.parent_file_id,
            created_at: file.created_at,
        }
    }
}

/// Formats a byte count into a human-readable size with one decimal place.
pub fn format_file_size(bytes: i64) -> String {
    const UNITS: [&str; 3] = ["B", "KB", "MB"];

    let mut size = bytes.max(0) as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }

    format!("{size:.1} GB")
}
