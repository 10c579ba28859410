//! Upload jobs: intermediate CSV rows resolved through the field map.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use super::UploadError;
use crate::config::{DestinationField, FieldMap};

/// Column carrying the source-of-record row a job came from.
pub const SOURCE_ROW_COLUMN: &str = "source_row";

/// One intermediate-CSV row ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    /// 1-indexed data row (header excluded).
    pub row: usize,
    /// Source-of-record data row, when the CSV carries one.
    pub source_row: Option<usize>,
    values: BTreeMap<DestinationField, Vec<String>>,
}

impl UploadJob {
    /// Resolves destination values from one CSV record.
    ///
    /// Columns absent from the header read as empty.
    #[must_use]
    pub fn from_record(row: usize, headers: &[String], record: &[String], map: &FieldMap) -> Self {
        let mut values = BTreeMap::new();
        for field in DestinationField::ALL {
            let cells: Vec<&str> = map
                .columns(field)
                .iter()
                .map(|column| cell(headers, record, column))
                .collect();
            let resolved = match field {
                DestinationField::Keywords => {
                    let mut keywords = Vec::new();
                    for raw in &cells {
                        for keyword in split_keywords(raw) {
                            if !keywords.contains(&keyword) {
                                keywords.push(keyword);
                            }
                        }
                    }
                    keywords
                }
                DestinationField::Agency => {
                    let mut agencies: Vec<String> = Vec::new();
                    for value in cells.iter().filter(|v| !v.is_empty()) {
                        if !agencies.iter().any(|a| a == value) {
                            agencies.push((*value).to_string());
                        }
                    }
                    agencies
                }
                _ => cells
                    .iter()
                    .find(|value| !value.is_empty())
                    .map(|value| vec![(*value).to_string()])
                    .unwrap_or_default(),
            };
            values.insert(field, resolved);
        }

        let notes = compose_collection_notes(
            values
                .get(&DestinationField::CollectionNotes)
                .and_then(|v| v.first())
                .map_or("", String::as_str),
            values
                .get(&DestinationField::DownloadDate)
                .and_then(|v| v.first())
                .map_or("", String::as_str),
        );
        values.insert(
            DestinationField::CollectionNotes,
            notes.into_iter().collect(),
        );

        let source_row = cell(headers, record, SOURCE_ROW_COLUMN).parse().ok();
        Self {
            row,
            source_row,
            values,
        }
    }

    /// Every value of `field`; empty when unmapped or blank.
    #[must_use]
    pub fn values(&self, field: DestinationField) -> &[String] {
        self.values.get(&field).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn first(&self, field: DestinationField) -> Option<&str> {
        self.values(field).first().map(String::as_str)
    }

    /// Project title: pre-title and title joined by a space.
    #[must_use]
    pub fn title(&self) -> String {
        [
            self.first(DestinationField::PreTitle),
            self.first(DestinationField::Title),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    }

    #[must_use]
    pub fn source_url(&self) -> Option<&str> {
        self.first(DestinationField::OriginalUrl)
    }

    /// Folder holding the files to attach, joined onto `base` when given.
    #[must_use]
    pub fn folder(&self, base: Option<&Path>) -> Option<PathBuf> {
        let relative = normalize_folder(self.first(DestinationField::Folder)?)?;
        Some(match base {
            Some(base) => base.join(relative),
            None => relative,
        })
    }
}

fn cell<'r>(headers: &[String], record: &'r [String], name: &str) -> &'r str {
    headers
        .iter()
        .position(|header| header == name)
        .and_then(|position| record.get(position))
        .map_or("", |value| value.trim())
}

/// Reads rows `start_row..=end_row` (1-indexed, header excluded).
///
/// # Errors
///
/// Returns [`UploadError::Configuration`] for an empty or out-of-range
/// window and [`UploadError::Csv`] when the file cannot be parsed.
#[instrument(skip(map), fields(path = %path.display()))]
pub fn load_jobs(
    path: &Path,
    start_row: usize,
    end_row: usize,
    map: &FieldMap,
) -> Result<Vec<UploadJob>, UploadError> {
    if start_row == 0 {
        return Err(UploadError::Configuration(
            "--start-row counts from 1".to_string(),
        ));
    }
    if end_row < start_row {
        return Err(UploadError::Configuration(format!(
            "--end-row {end_row} is before --start-row {start_row}"
        )));
    }

    let csv_error = |source| UploadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut jobs = Vec::new();
    let mut total = 0;
    for (offset, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        let row = offset + 1;
        total = row;
        if (start_row..=end_row).contains(&row) {
            let cells: Vec<String> = record.iter().map(str::to_string).collect();
            jobs.push(UploadJob::from_record(row, &headers, &cells, map));
        }
    }

    if end_row > total {
        return Err(UploadError::Configuration(format!(
            "--end-row {end_row} is beyond the {total} data rows of {}",
            path.display()
        )));
    }
    debug!(jobs = jobs.len(), "loaded upload jobs");
    Ok(jobs)
}

/// Splits a keyword cell on commas after dropping quotes and brackets.
#[must_use]
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.chars()
        .filter(|c| !matches!(c, '\'' | '"' | '[' | ']'))
        .collect::<String>()
        .split(',')
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .map(str::to_string)
        .collect()
}

/// Notes followed by `(Downloaded <date>)` when a date is known.
#[must_use]
pub fn compose_collection_notes(notes: &str, download_date: &str) -> Option<String> {
    let notes = notes.trim();
    let date = download_date.trim();
    match (notes.is_empty(), date.is_empty()) {
        (true, true) => None,
        (false, true) => Some(notes.to_string()),
        (true, false) => Some(format!("(Downloaded {date})")),
        (false, false) => Some(format!("{notes} (Downloaded {date})")),
    }
}

/// Strips a leading `./` or `.\` and converts separators to the host's.
#[must_use]
pub fn normalize_folder(raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix("./")
        .or_else(|| trimmed.strip_prefix(".\\"))
        .unwrap_or(trimmed);
    if stripped.is_empty() {
        return None;
    }
    let native = if std::path::MAIN_SEPARATOR == '/' {
        stripped.replace('\\', "/")
    } else {
        stripped.replace('/', "\\")
    };
    Some(PathBuf::from(native))
}

/// Regular files of `folder`, sorted by name.
///
/// # Errors
///
/// Returns [`UploadError::Io`] when the folder cannot be listed.
pub fn list_upload_files(folder: &Path) -> Result<Vec<PathBuf>, UploadError> {
    let io_error = |source| UploadError::Io {
        path: folder.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        if entry.file_type().map_err(io_error)?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
