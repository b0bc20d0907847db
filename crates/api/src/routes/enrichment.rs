//! Enrichment submission and job status handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use domain::models::{EnrichmentAccepted, EnrichmentRequest, JobStatus, JobStatusResponse};
use persistence::repositories::UploadedFileRepository;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::enrichment::EnrichmentTask;

/// Submit an enrichment job for a stored file.
///
/// POST /api/v1/files/:file_id/enrich
///
/// Validation failures are rejected here synchronously; once a job id is
/// returned, every later failure is observed through status polling.
pub async fn submit_enrichment(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
    Json(request): Json<EnrichmentRequest>,
) -> Result<(StatusCode, Json<EnrichmentAccepted>), ApiError> {
    request.validate()?;

    let repo = UploadedFileRepository::new(state.pool.clone());
    let source = repo
        .find_by_id(file_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("File not found".to_string()))?;

    if repo.exists_by_name(&request.enriched_file_name).await? {
        return Err(ApiError::Conflict(
            "A file with this name already exists".to_string(),
        ));
    }

    let job_id = Uuid::new_v4();
    state.tracker.create(job_id).await;

    let task = EnrichmentTask {
        job_id,
        file_id: source.id,
        request,
    };
    if let Err(err) = state.jobs.submit(task) {
        state.tracker.remove(job_id).await;
        return Err(ApiError::ServiceUnavailable(err.to_string()));
    }

    info!(job_id = %job_id, file_id, "Enrichment job queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(EnrichmentAccepted {
            job_id,
            status: JobStatus::Queued,
        }),
    ))
}

/// Poll the current state of an enrichment job.
///
/// GET /api/v1/jobs/:job_id
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let snapshot = state
        .tracker
        .get(job_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;

    Ok(Json(JobStatusResponse { job_id, snapshot }))
}
