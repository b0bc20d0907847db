//! Uploaded-file entity mapping for the `uploaded_files` table.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use domain::models::UploadedFile;

/// Database row for a stored CSV file.
#[derive(Debug, Clone, FromRow)]
pub struct UploadedFileEntity {
    pub id: i64,
    pub original_name: String,
    pub storage_path: String,
    pub file_size: i64,
    pub columns: Option<Vec<String>>,
    pub is_enriched: bool,
    pub parent_file_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl UploadedFileEntity {
    /// Convert into the domain model.
    pub fn into_model(self) -> UploadedFile {
        UploadedFile {
            id: self.id,
            original_name: self.original_name,
            storage_path: self.storage_path,
            file_size: self.file_size,
            columns: self.columns,
            is_enriched: self.is_enriched,
            parent_file_id: self.parent_file_id,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_model_preserves_fields() {
        let entity = UploadedFileEntity {
            id: 3,
            original_name: "orders.csv".to_string(),
            storage_path: "f00d.csv".to_string(),
            file_size: 128,
            columns: Some(vec!["order_id".to_string()]),
            is_enriched: true,
            parent_file_id: Some(1),
            created_at: Utc::now(),
        };

        let model = entity.clone().into_model();
        assert_eq!(model.id, entity.id);
        assert_eq!(model.original_name, "orders.csv");
        assert_eq!(model.parent_file_id, Some(1));
        assert!(model.is_enriched);
    }
}
