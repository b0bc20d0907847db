//! Enrichment request and job lifecycle models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use shared::validation::{validate_csv_name, validate_http_url};

/// Request payload for submitting an enrichment job.
///
/// Validated synchronously at submission time; a job is only created once
/// every rule here passes. Uniqueness of `enriched_file_name` is checked
/// against the catalog by the handler, not here.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EnrichmentRequest {
    #[validate(url(message = "API endpoint must be a valid URL"))]
    #[validate(custom(function = "validate_http_url"))]
    pub api_endpoint: String,

    #[validate(length(min = 1, max = 255, message = "File key column must not be empty"))]
    pub file_key: String,

    #[validate(length(min = 1, max = 255, message = "API key field must not be empty"))]
    pub api_key: String,

    #[validate(custom(function = "validate_csv_name"))]
    pub enriched_file_name: String,
}

/// Lifecycle state of an enrichment job.
///
/// Transitions: `Queued -> Processing -> {Completed, Failed}`.
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether no further transitions can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "Queued",
            JobStatus::Processing => "Processing",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a job, as seen by status pollers.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub progress: u8,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_file_id: Option<i64>,
}

/// Response body for the job status polling endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    #[serde(flatten)]
    pub snapshot: JobSnapshot,
}

/// Response body returned when an enrichment request is accepted.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentAccepted {
    pub job_id: Uuid,
    pub status: JobStatus,
}
