//! CSV-backed sheet of record with per-row fingerprints.

use std::fs::File;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use super::ReconcileError;
use crate::config::SourceSettings;

/// Cells to write into one row of the sheet of record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowUpdate {
    /// Zero-based data row (header excluded).
    pub row: usize,
    /// Source URL the row must still carry.
    pub source_url: String,
    pub claim_owner: String,
    pub download_location: String,
    /// Status label, written only when the sheet has a status column.
    pub status: Option<String>,
}

/// Storage for the sheet of record.
pub trait RecordSheet: Send {
    /// Applies `update` or leaves the sheet untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Conflict`] when the row changed since it was
    /// loaded, moved, or is already claimed.
    fn apply(&mut self, update: &RowUpdate) -> Result<(), ReconcileError>;
}

/// Sheet of record stored as a local CSV file.
///
/// Every data row is fingerprinted when the sheet is opened. An update
/// re-reads the file and refuses to touch a row whose fingerprint moved.
#[derive(Debug)]
pub struct CsvRecordSheet {
    path: PathBuf,
    claim_owner_column: usize,
    source_url_column: usize,
    download_location_column: usize,
    status_column: Option<usize>,
    fingerprints: Vec<[u8; 32]>,
}

impl CsvRecordSheet {
    /// Loads `path` and fingerprints its rows.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Io`] or [`ReconcileError::Csv`] when the file
    /// cannot be read, and [`ReconcileError::Configuration`] when the named
    /// status column is missing from the header.
    #[instrument(skip(layout), fields(path = %path.display()))]
    pub fn open(
        path: &Path,
        layout: &SourceSettings,
        status_column: Option<&str>,
    ) -> Result<Self, ReconcileError> {
        let records = read_records(path)?;
        let header = records.first().cloned().unwrap_or_default();

        let status_column = match status_column {
            Some(name) => Some(
                header
                    .iter()
                    .position(|cell| cell.trim().eq_ignore_ascii_case(name.trim()))
                    .ok_or_else(|| {
                        ReconcileError::Configuration(format!(
                            "status column '{name}' not found in {}",
                            path.display()
                        ))
                    })?,
            ),
            None => None,
        };

        let fingerprints: Vec<[u8; 32]> = records.iter().skip(1).map(|r| fingerprint(r)).collect();
        debug!(rows = fingerprints.len(), "sheet of record loaded");
        Ok(Self {
            path: path.to_path_buf(),
            claim_owner_column: layout.claim_owner_column,
            source_url_column: layout.source_url_column,
            download_location_column: layout.download_location_column,
            status_column,
            fingerprints,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of data rows seen at load time.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    fn check(&self, update: &RowUpdate, current: &[String]) -> Result<(), ReconcileError> {
        let conflict = |reason: String| ReconcileError::Conflict {
            row: update.row,
            reason,
        };

        let url = cell(current, self.source_url_column);
        if url != update.source_url.trim() {
            return Err(conflict(format!(
                "row now holds '{url}' instead of '{}'",
                update.source_url.trim()
            )));
        }
        if self.fingerprints.get(update.row) != Some(&fingerprint(current)) {
            return Err(conflict("row was edited since the sheet was loaded".to_string()));
        }
        let owner = cell(current, self.claim_owner_column);
        if !owner.is_empty() {
            return Err(conflict(format!("row is already claimed by '{owner}'")));
        }
        Ok(())
    }
}

impl RecordSheet for CsvRecordSheet {
    #[instrument(skip(self, update), fields(row = update.row))]
    fn apply(&mut self, update: &RowUpdate) -> Result<(), ReconcileError> {
        let mut records = read_records(&self.path)?;
        let Some(current) = records.get_mut(update.row + 1) else {
            return Err(ReconcileError::RowMissing(update.row));
        };
        self.check(update, current)?;

        let mut writes = vec![
            (self.claim_owner_column, update.claim_owner.as_str()),
            (self.download_location_column, update.download_location.as_str()),
        ];
        if let (Some(column), Some(status)) = (self.status_column, update.status.as_deref()) {
            writes.push((column, status));
        }
        for (column, value) in writes {
            if current.len() <= column {
                current.resize(column + 1, String::new());
            }
            current[column] = value.to_string();
        }
        let refreshed = fingerprint(current);

        write_records(&self.path, &records)?;
        if let Some(slot) = self.fingerprints.get_mut(update.row) {
            *slot = refreshed;
        }
        debug!("sheet row updated");
        Ok(())
    }
}

fn cell(record: &[String], position: usize) -> &str {
    record.get(position).map_or("", |value| value.trim())
}

fn fingerprint(record: &[String]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for value in record {
        hasher.update(value.as_bytes());
        hasher.update([0x1f]);
    }
    hasher.finalize().into()
}

fn read_records(path: &Path) -> Result<Vec<Vec<String>>, ReconcileError> {
    let file = File::open(path).map_err(|source| ReconcileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);
    reader
        .records()
        .map(|record| {
            record
                .map(|record| record.iter().map(str::to_string).collect())
                .map_err(|source| ReconcileError::Csv {
                    path: path.to_path_buf(),
                    source,
                })
        })
        .collect()
}

/// Writes next to `path` and renames over it.
fn write_records(path: &Path, records: &[Vec<String>]) -> Result<(), ReconcileError> {
    let mut temp_name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    temp_name.push(".rescue-tmp");
    let temp = path.with_file_name(temp_name);

    let csv_error = |source| ReconcileError::Csv {
        path: temp.clone(),
        source,
    };
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(&temp)
        .map_err(csv_error)?;
    for record in records {
        writer.write_record(record).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| ReconcileError::Io {
        path: temp.clone(),
        source,
    })?;
    drop(writer);

    std::fs::rename(&temp, path).map_err(|source| ReconcileError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SHEET: &str = "\
Office,Claimed,Agency,Title,Notes,Tags,URL,Size,Format,Owner2,Status,Download Location
Data,,CDC,Cases,,,https://data.cdc.gov/a,,,,,
Data,,CDC,Deaths,,,https://data.cdc.gov/b,,,,,
";

    fn sheet(text: &str) -> (tempfile::TempDir, PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("sheet.csv");
        std::fs::write(&path, text).unwrap();
        (temp, path)
    }

    fn update(row: usize, url: &str) -> RowUpdate {
        RowUpdate {
            row,
            source_url: url.to_string(),
            claim_owner: "bot@example.org".to_string(),
            download_location: "https://archive.example/project/7".to_string(),
            status: Some("Done".to_string()),
        }
    }

    #[test]
    fn test_apply_sets_owner_location_and_status() {
        let (_temp, path) = sheet(SHEET);
        let mut sheet = CsvRecordSheet::open(&path, &SourceSettings::default(), Some("status")).unwrap();
        assert_eq!(sheet.len(), 2);

        sheet.apply(&update(1, "https://data.cdc.gov/b")).unwrap();

        let rows = read_records(&path).unwrap();
        assert_eq!(rows[2][1], "bot@example.org");
        assert_eq!(rows[2][10], "Done");
        assert_eq!(rows[2][11], "https://archive.example/project/7");
        assert_eq!(rows[1][1], "");
    }

    #[test]
    fn test_second_apply_to_same_row_conflicts() {
        let (_temp, path) = sheet(SHEET);
        let mut sheet = CsvRecordSheet::open(&path, &SourceSettings::default(), None).unwrap();
        sheet.apply(&update(0, "https://data.cdc.gov/a")).unwrap();
        let error = sheet.apply(&update(0, "https://data.cdc.gov/a")).unwrap_err();
        assert!(matches!(error, ReconcileError::Conflict { row: 0, .. }));
    }

    #[test]
    fn test_moved_row_conflicts() {
        let (_temp, path) = sheet(SHEET);
        let mut sheet = CsvRecordSheet::open(&path, &SourceSettings::default(), None).unwrap();
        let error = sheet.apply(&update(0, "https://data.cdc.gov/b")).unwrap_err();
        assert!(matches!(error, ReconcileError::Conflict { .. }));
    }

    #[test]
    fn test_unknown_status_column_rejected() {
        let (_temp, path) = sheet(SHEET);
        let error =
            CsvRecordSheet::open(&path, &SourceSettings::default(), Some("Progress")).unwrap_err();
        assert!(matches!(error, ReconcileError::Configuration(_)));
    }

    #[test]
    fn test_row_beyond_sheet_is_missing() {
        let (_temp, path) = sheet(SHEET);
        let mut sheet = CsvRecordSheet::open(&path, &SourceSettings::default(), None).unwrap();
        let error = sheet.apply(&update(9, "https://data.cdc.gov/a")).unwrap_err();
        assert!(matches!(error, ReconcileError::RowMissing(9)));
    }
}
