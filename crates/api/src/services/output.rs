//! Output writer: spools joined rows, then atomically promotes the final CSV.
//!
//! Rows are appended before the final header is known (the union of columns
//! grows while rows are still being merged), so they are spooled as JSON
//! lines first and rendered to CSV at finalize time. The rendered file is
//! written next to its final location and renamed into place, so a partially
//! written output is never visible; dropping the writer without finalizing
//! removes every temporary artifact.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use super::tabular::Row;

/// Errors raised while writing the enriched output.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write output file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode spooled row: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to render output CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// A successfully promoted output file.
#[derive(Debug)]
pub struct PromotedFile {
    /// File name within the data directory.
    pub storage_name: String,
    pub file_size: u64,
    pub rows: usize,
}

/// Buffering writer for one enrichment job's output.
pub struct OutputWriter {
    storage_name: String,
    final_path: PathBuf,
    spool_path: PathBuf,
    csv_tmp_path: PathBuf,
    spool: BufWriter<File>,
    rows: usize,
    finalized: bool,
}

impl OutputWriter {
    /// Create a writer whose output will live in `data_dir` under a fresh
    /// storage name.
    pub fn create(data_dir: &Path) -> Result<Self, OutputError> {
        let id = Uuid::new_v4();
        let storage_name = format!("{id}.csv");
        let final_path = data_dir.join(&storage_name);
        let spool_path = data_dir.join(format!(".{id}.spool"));
        let csv_tmp_path = data_dir.join(format!(".{id}.csv.tmp"));

        let spool = BufWriter::new(File::create(&spool_path)?);

        Ok(Self {
            storage_name,
            final_path,
            spool_path,
            csv_tmp_path,
            spool,
            rows: 0,
            finalized: false,
        })
    }

    /// Append one joined row to the spool.
    pub fn append(&mut self, row: &Row) -> Result<(), OutputError> {
        let line = serde_json::to_string(row)?;
        writeln!(self.spool, "{line}")?;
        self.rows += 1;
        Ok(())
    }

    /// Render the spool to CSV under `header` and atomically promote it.
    ///
    /// Cells for columns a row never received are written empty, keeping
    /// every row's field count equal to the header's.
    pub fn finalize(mut self, header: &[String]) -> Result<PromotedFile, OutputError> {
        self.spool.flush()?;

        let reader = BufReader::new(File::open(&self.spool_path)?);
        let mut writer = csv::Writer::from_path(&self.csv_tmp_path)?;
        writer.write_record(header)?;

        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let row: Row = serde_json::from_str(&line)?;
            writer.write_record(
                header
                    .iter()
                    .map(|column| row.get(column).map(String::as_str).unwrap_or("")),
            )?;
        }
        writer.flush()?;
        drop(writer);

        let file_size = fs::metadata(&self.csv_tmp_path)?.len();
        fs::rename(&self.csv_tmp_path, &self.final_path)?;
        self.finalized = true;
        let _ = fs::remove_file(&self.spool_path);

        Ok(PromotedFile {
            storage_name: self.storage_name.clone(),
            file_size,
            rows: self.rows,
        })
    }

    /// Abandon the output, removing every temporary artifact.
    pub fn discard(self) {
        // Drop does the cleanup
    }
}

impl Drop for OutputWriter {
    fn drop(&mut self) {
        if !self.finalized {
            let _ = fs::remove_file(&self.spool_path);
            let _ = fs::remove_file(&self.csv_tmp_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>()
    }

    fn visible_files(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_finalize_writes_header_and_rows_in_order() {
        let dir = TempDir::new().unwrap();
        let mut writer = OutputWriter::create(dir.path()).unwrap();

        writer.append(&row(&[("id", "1"), ("name", "Alice")])).unwrap();
        writer.append(&row(&[("id", "2"), ("name", "Bob")])).unwrap();

        let header = vec!["id".to_string(), "name".to_string()];
        let promoted = writer.finalize(&header).unwrap();

        let content = fs::read_to_string(dir.path().join(&promoted.storage_name)).unwrap();
        assert_eq!(content, "id,name\n1,Alice\n2,Bob\n");
        assert_eq!(promoted.rows, 2);
        assert_eq!(promoted.file_size, content.len() as u64);
    }

    #[test]
    fn test_missing_columns_become_empty_cells() {
        let dir = TempDir::new().unwrap();
        let mut writer = OutputWriter::create(dir.path()).unwrap();

        writer
            .append(&row(&[("id", "1"), ("email", "a@x.com")]))
            .unwrap();
        writer.append(&row(&[("id", "2")])).unwrap();

        let header = vec!["id".to_string(), "email".to_string()];
        let promoted = writer.finalize(&header).unwrap();

        let content = fs::read_to_string(dir.path().join(&promoted.storage_name)).unwrap();
        assert_eq!(content, "id,email\n1,a@x.com\n2,\n");
    }

    #[test]
    fn test_fields_are_quote_escaped() {
        let dir = TempDir::new().unwrap();
        let mut writer = OutputWriter::create(dir.path()).unwrap();

        writer
            .append(&row(&[("id", "1"), ("note", "hello, \"world\"")]))
            .unwrap();

        let header = vec!["id".to_string(), "note".to_string()];
        let promoted = writer.finalize(&header).unwrap();

        let content = fs::read_to_string(dir.path().join(&promoted.storage_name)).unwrap();
        assert_eq!(content, "id,note\n1,\"hello, \"\"world\"\"\"\n");
    }

    #[test]
    fn test_discard_leaves_no_trace() {
        let dir = TempDir::new().unwrap();
        let mut writer = OutputWriter::create(dir.path()).unwrap();
        writer.append(&row(&[("id", "1")])).unwrap();

        writer.discard();
        assert!(visible_files(&dir).is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_without_finalize_cleans_up() {
        let dir = TempDir::new().unwrap();
        {
            let mut writer = OutputWriter::create(dir.path()).unwrap();
            writer.append(&row(&[("id", "1")])).unwrap();
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_only_final_file_visible_after_finalize() {
        let dir = TempDir::new().unwrap();
        let mut writer = OutputWriter::create(dir.path()).unwrap();
        writer.append(&row(&[("id", "1")])).unwrap();

        let promoted = writer.finalize(&[String::from("id")]).unwrap();

        assert_eq!(visible_files(&dir), vec![promoted.storage_name.clone()]);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
