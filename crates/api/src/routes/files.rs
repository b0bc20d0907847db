//! File upload, listing, preview, download, and delete handlers.

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use domain::models::{FilePreview, FileResponse, PreviewQuery, UploadedFile};
use persistence::repositories::{NewUploadedFile, UploadedFileRepository};
use shared::pagination::total_pages;
use shared::validation::validate_csv_name;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::tabular::{self, TabularError};

fn tabular_to_api_error(err: TabularError) -> ApiError {
    match err {
        TabularError::Malformed(msg) => ApiError::Validation(format!("File is not valid CSV: {msg}")),
        TabularError::Io(io) => ApiError::Internal(format!("Failed to read stored file: {io}")),
    }
}

async fn find_file(state: &AppState, file_id: i64) -> Result<UploadedFile, ApiError> {
    let repo = UploadedFileRepository::new(state.pool.clone());
    repo.find_by_id(file_id)
        .await?
        .map(|entity| entity.into_model())
        .ok_or_else(|| ApiError::NotFound("File not found".to_string()))
}

/// Upload a CSV file.
///
/// POST /api/v1/files
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileResponse>), ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("Failed to read upload: {e}")))?;
            upload = Some((name, data));
            break;
        }
    }

    let (name, data) =
        upload.ok_or_else(|| ApiError::Validation("Missing 'file' field".to_string()))?;

    validate_csv_name(&name).map_err(|e| {
        ApiError::Validation(
            e.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| "Only CSV files are allowed".to_string()),
        )
    })?;

    if data.is_empty() {
        return Err(ApiError::Validation("Uploaded file is empty".to_string()));
    }
    if data.len() > state.config.storage.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "File exceeds the maximum upload size of {} bytes",
            state.config.storage.max_upload_bytes
        )));
    }

    let repo = UploadedFileRepository::new(state.pool.clone());
    if repo.exists_by_name(&name).await? {
        return Err(ApiError::Conflict(
            "A file with this name already exists".to_string(),
        ));
    }

    let storage_name = format!("{}.csv", Uuid::new_v4());
    let path = state.config.storage.data_dir.join(&storage_name);
    tokio::fs::write(&path, &data)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to store file: {e}")))?;

    // Columns are parsed exactly once, here at upload time.
    let columns = match tabular::read_columns(&path) {
        Ok(columns) => columns,
        Err(err) => {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(tabular_to_api_error(err));
        }
    };

    let created = repo
        .create(NewUploadedFile {
            original_name: name.clone(),
            storage_path: storage_name,
            file_size: data.len() as i64,
            columns: Some(columns),
            is_enriched: false,
            parent_file_id: None,
        })
        .await;

    match created {
        Ok(entity) => {
            info!(file_id = entity.id, name = %name, size = data.len(), "File uploaded");
            Ok((
                StatusCode::CREATED,
                Json(FileResponse::from(entity.into_model())),
            ))
        }
        Err(err) => {
            let _ = tokio::fs::remove_file(&path).await;
            Err(err.into())
        }
    }
}

/// List all stored files, newest first.
///
/// GET /api/v1/files
pub async fn list_files(
    State(state): State<AppState>,
) -> Result<Json<Vec<FileResponse>>, ApiError> {
    let repo = UploadedFileRepository::new(state.pool.clone());
    let files = repo
        .list_all()
        .await?
        .into_iter()
        .map(|entity| FileResponse::from(entity.into_model()))
        .collect();
    Ok(Json(files))
}

/// Fetch metadata for one file.
///
/// GET /api/v1/files/:file_id
pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
) -> Result<Json<FileResponse>, ApiError> {
    let file = find_file(&state, file_id).await?;
    Ok(Json(FileResponse::from(file)))
}

/// Paged preview of a file's rows.
///
/// GET /api/v1/files/:file_id/preview?page=&page_size=
pub async fn preview_file(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<FilePreview>, ApiError> {
    query.validate()?;

    let file = find_file(&state, file_id).await?;
    let path = state.config.storage.data_dir.join(&file.storage_path);

    let offset = (query.page - 1) * query.page_size;
    let (columns, rows, row_count) =
        tabular::read_page(&path, offset, query.page_size).map_err(tabular_to_api_error)?;

    Ok(Json(FilePreview {
        columns,
        rows,
        row_count,
        current_page: query.page,
        page_size: query.page_size,
        total_pages: total_pages(row_count, query.page_size),
        can_load_all: row_count <= state.config.storage.preview_load_all_limit,
    }))
}

/// Stream a file's bytes as a CSV attachment.
///
/// GET /api/v1/files/:file_id/download
pub async fn download_file(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
) -> Result<Response, ApiError> {
    let file = find_file(&state, file_id).await?;
    let path = state.config.storage.data_dir.join(&file.storage_path);

    let handle = tokio::fs::File::open(&path)
        .await
        .map_err(|e| ApiError::Internal(format!("Stored file is unreadable: {e}")))?;
    let body = Body::from_stream(ReaderStream::new(handle));

    let headers = [
        (header::CONTENT_TYPE, "text/csv".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file.original_name),
        ),
    ];

    Ok((headers, body).into_response())
}

/// Delete a file's bytes and its catalog row.
///
/// DELETE /api/v1/files/:file_id
pub async fn delete_file(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let file = find_file(&state, file_id).await?;
    let path = state.config.storage.data_dir.join(&file.storage_path);

    if let Err(e) = tokio::fs::remove_file(&path).await {
        // The row still goes; orphaned bytes are better than a ghost entry.
        warn!(file_id, error = %e, "Failed to remove stored file bytes");
    }

    let repo = UploadedFileRepository::new(state.pool.clone());
    repo.delete(file_id).await?;

    info!(file_id, name = %file.original_name, "File deleted");
    Ok(StatusCode::NO_CONTENT)
}
