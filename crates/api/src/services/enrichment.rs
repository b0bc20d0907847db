//! Enrichment engine: fetch -> validate -> join -> write, per job.
//!
//! Drives one job from `Processing` to a terminal state. Any error is
//! recorded on the job for asynchronous observation and never propagates
//! out of [`EnrichmentEngine::execute`], so a failing job cannot take a
//! worker down or affect concurrently running jobs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use domain::models::EnrichmentRequest;
use persistence::repositories::{NewUploadedFile, UploadedFileRepository};

use super::external_api::{ExternalFetcher, FetchError};
use super::output::{OutputError, OutputWriter};
use super::record_index::{self, IndexError, RecordIndex};
use super::tabular::{self, TabularError};
use crate::jobs::tracker::JobTracker;

/// One unit of work for the worker pool.
#[derive(Debug, Clone)]
pub struct EnrichmentTask {
    pub job_id: Uuid,
    pub file_id: i64,
    pub request: EnrichmentRequest,
}

/// Everything that can fail a running job. The `Display` form is what
/// status pollers eventually see as the job's error description.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("source file not found")]
    SourceMissing,

    #[error("key column '{0}' not found in source file columns")]
    InvalidKeyColumn(String),

    #[error("source file is not valid CSV: {0}")]
    MalformedInput(String),

    #[error("external API unreachable: {0}")]
    UnreachableApi(String),

    #[error("external API response has invalid shape: {0}")]
    InvalidApiShape(String),

    #[error("{0}")]
    MissingApiKey(String),

    #[error("failed to write enriched output: {0}")]
    WriteFailure(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<TabularError> for EnrichmentError {
    fn from(err: TabularError) -> Self {
        match err {
            TabularError::Malformed(msg) => EnrichmentError::MalformedInput(msg),
            TabularError::Io(io) => {
                EnrichmentError::MalformedInput(format!("failed to read source file: {io}"))
            }
        }
    }
}

impl From<FetchError> for EnrichmentError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Unreachable(msg) => EnrichmentError::UnreachableApi(msg),
            FetchError::InvalidShape(msg) => EnrichmentError::InvalidApiShape(msg),
        }
    }
}

impl From<IndexError> for EnrichmentError {
    fn from(err: IndexError) -> Self {
        EnrichmentError::MissingApiKey(err.to_string())
    }
}

impl From<OutputError> for EnrichmentError {
    fn from(err: OutputError) -> Self {
        EnrichmentError::WriteFailure(err.to_string())
    }
}

/// Inputs for the chunked join pass.
pub struct JoinSpec<'a> {
    pub source_path: &'a Path,
    pub data_dir: &'a Path,
    pub source_columns: &'a [String],
    pub file_key: &'a str,
    pub api_key: &'a str,
    pub chunk_size: usize,
}

/// Result of a promoted join pass.
#[derive(Debug)]
pub struct JoinOutcome {
    /// Output file name within the data directory.
    pub storage_name: String,
    pub file_size: u64,
    /// Final header: source columns plus every API field merged into at
    /// least one row.
    pub columns: Vec<String>,
    pub rows: usize,
}

/// Orchestrates enrichment jobs end to end.
pub struct EnrichmentEngine {
    pool: PgPool,
    tracker: Arc<JobTracker>,
    fetcher: ExternalFetcher,
    data_dir: PathBuf,
    chunk_size: usize,
}

impl EnrichmentEngine {
    pub fn new(
        pool: PgPool,
        tracker: Arc<JobTracker>,
        fetcher: ExternalFetcher,
        data_dir: PathBuf,
        chunk_size: usize,
    ) -> Self {
        Self {
            pool,
            tracker,
            fetcher,
            data_dir,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Run one job to a terminal state.
    pub async fn execute(&self, task: EnrichmentTask) {
        let job_id = task.job_id;
        self.tracker.set_processing(job_id).await;

        match self.run(&task).await {
            Ok(file_id) => {
                info!(job_id = %job_id, result_file_id = file_id, "Enrichment completed");
                self.tracker.complete(job_id, file_id).await;
            }
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "Enrichment failed");
                self.tracker.fail(job_id, err.to_string()).await;
            }
        }
    }

    async fn run(&self, task: &EnrichmentTask) -> Result<i64, EnrichmentError> {
        let repo = UploadedFileRepository::new(self.pool.clone());
        let source = repo
            .find_by_id(task.file_id)
            .await?
            .ok_or(EnrichmentError::SourceMissing)?;
        let source_path = self.data_dir.join(&source.storage_path);

        let source_columns = match source.columns {
            Some(columns) if !columns.is_empty() => columns,
            _ => tabular::read_columns(&source_path)?,
        };
        if !source_columns.iter().any(|c| c == &task.request.file_key) {
            return Err(EnrichmentError::InvalidKeyColumn(
                task.request.file_key.clone(),
            ));
        }

        let records = self.fetcher.fetch(&task.request.api_endpoint).await?;
        let index = RecordIndex::build(records, &task.request.api_key)?;

        let outcome = run_join(
            JoinSpec {
                source_path: &source_path,
                data_dir: &self.data_dir,
                source_columns: &source_columns,
                file_key: &task.request.file_key,
                api_key: &task.request.api_key,
                chunk_size: self.chunk_size,
            },
            &index,
            &self.tracker,
            task.job_id,
        )
        .await?;

        let created = repo
            .create(NewUploadedFile {
                original_name: task.request.enriched_file_name.clone(),
                storage_path: outcome.storage_name.clone(),
                file_size: outcome.file_size as i64,
                columns: Some(outcome.columns.clone()),
                is_enriched: true,
                parent_file_id: Some(source.id),
            })
            .await;

        match created {
            Ok(entity) => Ok(entity.id),
            Err(err) => {
                // The file was already promoted; remove it again so nothing
                // outside the catalog ever lists it.
                let _ = std::fs::remove_file(self.data_dir.join(&outcome.storage_name));
                Err(err.into())
            }
        }
    }
}

/// Stream the source through the index, chunk by chunk, and promote the
/// joined output.
///
/// Row output order equals row input order. For each matched row the API
/// record's fields are merged in, skipping the API-side key field and any
/// field name that collides with a source column (source values win, no
/// renaming). Unmatched rows pass through unchanged. Progress is published
/// after every chunk as `floor(rows_processed / total_rows * 100)`.
pub async fn run_join(
    spec: JoinSpec<'_>,
    index: &RecordIndex,
    tracker: &JobTracker,
    job_id: Uuid,
) -> Result<JoinOutcome, EnrichmentError> {
    // Full validating pass first: a ragged row anywhere rejects the file
    // before any output artifact exists.
    let total_rows = tabular::row_count(spec.source_path)?;

    let mut reader = tabular::open(spec.source_path, spec.chunk_size)?;
    let mut writer = OutputWriter::create(spec.data_dir)?;

    let source_set: HashSet<&str> = spec.source_columns.iter().map(String::as_str).collect();
    let mut header: Vec<String> = spec.source_columns.to_vec();
    let mut processed = 0usize;

    while let Some(chunk) = reader.next_chunk()? {
        let chunk_rows = chunk.len();

        for mut row in chunk {
            let key = row
                .get(spec.file_key)
                .map(String::as_str)
                .unwrap_or_default();

            if let Some(record) = index.lookup(key) {
                for (field, value) in record {
                    if field == spec.api_key || source_set.contains(field.as_str()) {
                        continue;
                    }
                    if !header.iter().any(|h| h == field) {
                        header.push(field.clone());
                    }
                    row.insert(field.clone(), record_index::cell_text(value));
                }
            }

            writer.append(&row)?;
        }

        processed += chunk_rows;
        let progress = ((processed * 100) / total_rows) as u8;
        tracker.publish_progress(job_id, progress).await;
    }

    if total_rows == 0 {
        // Header-only source: nothing to join, but the job still finishes.
        tracker.publish_progress(job_id, 100).await;
    }

    let promoted = writer.finalize(&header)?;

    Ok(JoinOutcome {
        storage_name: promoted.storage_name,
        file_size: promoted.file_size,
        columns: header,
        rows: promoted.rows,
    })
}
