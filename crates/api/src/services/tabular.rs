//! Tabular store: lazy, chunked access to stored CSV files.
//!
//! All readers are strict: a data row whose field count differs from the
//! header fails the whole file rather than being padded or truncated.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use thiserror::Error;

/// A single CSV row as a column-name-to-value mapping.
pub type Row = HashMap<String, String>;

/// Errors raised while reading a stored CSV file.
#[derive(Debug, Error)]
pub enum TabularError {
    #[error("file is not parseable as CSV: {0}")]
    Malformed(String),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for TabularError {
    fn from(err: csv::Error) -> Self {
        let message = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(io) => TabularError::Io(io),
            _ => TabularError::Malformed(message),
        }
    }
}

/// Lazy chunked reader over the data rows of a CSV file.
///
/// Each call to [`RowReader::next_chunk`] pulls at most `chunk_size` rows
/// from the underlying file, so memory use stays bounded regardless of
/// file size. Re-open the file for a fresh pass.
pub struct RowReader {
    columns: Vec<String>,
    records: csv::StringRecordsIntoIter<File>,
    chunk_size: usize,
}

impl RowReader {
    /// Header columns, in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Read the next chunk of rows; `None` once the file is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<Row>>, TabularError> {
        let mut rows = Vec::with_capacity(self.chunk_size);

        while rows.len() < self.chunk_size {
            match self.records.next() {
                Some(record) => {
                    let record = record?;
                    rows.push(zip_row(&self.columns, &record));
                }
                None => break,
            }
        }

        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows))
        }
    }
}

fn zip_row(columns: &[String], record: &csv::StringRecord) -> Row {
    columns
        .iter()
        .zip(record.iter())
        .map(|(column, value)| (column.clone(), value.to_string()))
        .collect()
}

/// Open a CSV file for chunked reading.
pub fn open(path: &Path, chunk_size: usize) -> Result<RowReader, TabularError> {
    let mut reader = csv::ReaderBuilder::new().from_path(path)?;

    let headers = reader.headers()?;
    if headers.is_empty() {
        return Err(TabularError::Malformed("missing header row".to_string()));
    }
    let columns: Vec<String> = headers.iter().map(str::to_string).collect();

    Ok(RowReader {
        columns,
        records: reader.into_records(),
        chunk_size,
    })
}

/// Parse just the header row of a CSV file.
pub fn read_columns(path: &Path) -> Result<Vec<String>, TabularError> {
    Ok(open(path, 1)?.columns)
}

/// Count the data rows of a CSV file, validating every row on the way.
pub fn row_count(path: &Path) -> Result<usize, TabularError> {
    let mut reader = open(path, 1)?;
    let mut count = 0usize;

    while let Some(record) = reader.records.next() {
        record?;
        count += 1;
    }

    Ok(count)
}

/// Read one page of rows plus the total row count in a single pass.
///
/// Returns `(columns, page_rows, row_count)`. Rows before `offset` and
/// after `offset + limit` are scanned (for validation and counting) but
/// not materialized.
pub fn read_page(
    path: &Path,
    offset: usize,
    limit: usize,
) -> Result<(Vec<String>, Vec<Row>, usize), TabularError> {
    let mut reader = open(path, limit.max(1))?;
    let columns = reader.columns.clone();

    let mut rows = Vec::new();
    let mut count = 0usize;

    while let Some(record) = reader.records.next() {
        let record = record?;
        if count >= offset && rows.len() < limit {
            rows.push(zip_row(&columns, &record));
        }
        count += 1;
    }

    Ok((columns, rows, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "a.csv", "id,name\n1,Alice\n");

        let columns = read_columns(&path).unwrap();
        assert_eq!(columns, vec!["id", "name"]);
    }

    #[test]
    fn test_row_count() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "a.csv", "id,name\n1,Alice\n2,Bob\n3,Carol\n");

        assert_eq!(row_count(&path).unwrap(), 3);
    }

    #[test]
    fn test_header_only_file_has_zero_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "a.csv", "id,name\n");

        assert_eq!(row_count(&path).unwrap(), 0);
    }

    #[test]
    fn test_empty_file_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "a.csv", "");

        assert!(matches!(
            read_columns(&path),
            Err(TabularError::Malformed(_))
        ));
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "a.csv", "id,name\n1,Alice\n2,Bob,extra\n");

        assert!(matches!(row_count(&path), Err(TabularError::Malformed(_))));
    }

    #[test]
    fn test_chunked_reading_preserves_order() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "a.csv", "n\n1\n2\n3\n4\n5\n");

        let mut reader = open(&path, 2).unwrap();
        let mut seen = Vec::new();
        let mut chunks = 0;

        while let Some(chunk) = reader.next_chunk().unwrap() {
            chunks += 1;
            assert!(chunk.len() <= 2);
            for row in chunk {
                seen.push(row["n"].clone());
            }
        }

        assert_eq!(chunks, 3);
        assert_eq!(seen, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_quoted_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "a.csv",
            "id,note\n1,\"hello, world\"\n2,\"say \"\"hi\"\"\"\n",
        );

        let mut reader = open(&path, 10).unwrap();
        let chunk = reader.next_chunk().unwrap().unwrap();
        assert_eq!(chunk[0]["note"], "hello, world");
        assert_eq!(chunk[1]["note"], "say \"hi\"");
    }

    #[test]
    fn test_read_page_window() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "a.csv", "n\n1\n2\n3\n4\n5\n");

        let (columns, rows, total) = read_page(&path, 2, 2).unwrap();
        assert_eq!(columns, vec!["n"]);
        assert_eq!(total, 5);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["n"], "3");
        assert_eq!(rows[1]["n"], "4");
    }

    #[test]
    fn test_read_page_past_end() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "a.csv", "n\n1\n2\n");

        let (_, rows, total) = read_page(&path, 10, 5).unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 2);
    }
}
