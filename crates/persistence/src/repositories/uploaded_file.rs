//! Uploaded-file repository for database operations.

use sqlx::PgPool;

use crate::entities::UploadedFileEntity;
use crate::metrics::QueryTimer;

/// Parameters for inserting a catalog row.
#[derive(Debug, Clone)]
pub struct NewUploadedFile {
    pub original_name: String,
    pub storage_path: String,
    pub file_size: i64,
    pub columns: Option<Vec<String>>,
    pub is_enriched: bool,
    pub parent_file_id: Option<i64>,
}

/// Repository for uploaded-file catalog operations.
#[derive(Clone)]
pub struct UploadedFileRepository {
    pool: PgPool,
}

impl UploadedFileRepository {
    /// Creates a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new file row and return it.
    pub async fn create(&self, file: NewUploadedFile) -> Result<UploadedFileEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_uploaded_file");
        let result = sqlx::query_as::<_, UploadedFileEntity>(
            r#"
            INSERT INTO uploaded_files
                (original_name, storage_path, file_size, columns, is_enriched, parent_file_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&file.original_name)
        .bind(&file.storage_path)
        .bind(file.file_size)
        .bind(&file.columns)
        .bind(file.is_enriched)
        .bind(file.parent_file_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a file by its catalog id.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<UploadedFileEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_file_by_id");
        let result = sqlx::query_as::<_, UploadedFileEntity>(
            r#"
            SELECT * FROM uploaded_files WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List every file in the catalog, newest first.
    pub async fn list_all(&self) -> Result<Vec<UploadedFileEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_files");
        let result = sqlx::query_as::<_, UploadedFileEntity>(
            r#"
            SELECT * FROM uploaded_files ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Whether a file with this display name already exists.
    pub async fn exists_by_name(&self, name: &str) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("file_exists_by_name");
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM uploaded_files WHERE original_name = $1
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(count.0 > 0)
    }

    /// Delete a file row. Returns the number of rows removed.
    pub async fn delete(&self, id: i64) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_file");
        let result = sqlx::query(
            r#"
            DELETE FROM uploaded_files WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }
}
