//! Tabular source of dataset records.
//!
//! The source is a CSV file with a header row. Eligibility is decided by
//! three positional cells (claim owner, download location, source URL) whose
//! positions come from [`SourceSettings`]; descriptive cells such as the
//! title are looked up by header name.

mod select;

pub use select::{RowSelector, SelectError, WorkItem};

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::SourceSettings;

/// Errors raised while reading a tabular file.
#[derive(Debug, Error)]
pub enum SourceError {
    /// File could not be opened.
    #[error("failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be parsed.
    #[error("malformed CSV in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// One data row of the source. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// Zero-based data-row index (header excluded).
    pub index: usize,
    cells: Vec<String>,
}

impl SourceRow {
    #[must_use]
    pub fn new(index: usize, cells: Vec<String>) -> Self {
        Self { index, cells }
    }

    /// Cell at `position`, or `""` when the row is shorter.
    #[must_use]
    pub fn cell(&self, position: usize) -> &str {
        self.cells.get(position).map_or("", String::as_str)
    }

    #[must_use]
    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    #[must_use]
    pub fn claim_owner<'a>(&'a self, layout: &SourceSettings) -> &'a str {
        self.cell(layout.claim_owner_column)
    }

    #[must_use]
    pub fn download_location<'a>(&'a self, layout: &SourceSettings) -> &'a str {
        self.cell(layout.download_location_column)
    }

    #[must_use]
    pub fn source_url<'a>(&'a self, layout: &SourceSettings) -> &'a str {
        self.cell(layout.source_url_column).trim()
    }

    /// Unclaimed, not yet downloaded, and hosted on the configured source site.
    #[must_use]
    pub fn is_eligible(&self, layout: &SourceSettings) -> bool {
        self.claim_owner(layout).trim().is_empty()
            && self.download_location(layout).trim().is_empty()
            && self.source_url(layout).starts_with(&layout.host_prefix)
    }
}

/// A loaded tabular file.
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    pub headers: Vec<String>,
    pub rows: Vec<SourceRow>,
}

impl SourceTable {
    /// Reads a CSV file with a header row. Ragged rows are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the file cannot be opened or parsed.
    #[instrument(fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let file = std::fs::File::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_reader(file).map_err(|source| SourceError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(rows = table.rows.len(), columns = table.headers.len(), "loaded table");
        Ok(table)
    }

    /// Reads CSV text from any reader.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`csv::Error`].
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);
        let headers = csv_reader
            .headers()?
            .iter()
            .map(|header| header.trim_start_matches('\u{feff}').to_string())
            .collect();
        let mut rows = Vec::new();
        for (index, record) in csv_reader.records().enumerate() {
            let record = record?;
            rows.push(SourceRow::new(
                index,
                record.iter().map(str::to_string).collect(),
            ));
        }
        Ok(Self { headers, rows })
    }

    /// Position of the first header matching one of `candidates`.
    #[must_use]
    pub fn find_column(&self, candidates: &[String]) -> Option<usize> {
        find_column(&self.headers, candidates)
    }

    /// Position of a header by exact name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }
}

/// Finds a header by case-insensitive partial match.
///
/// Candidates are tried in order; a candidate matches a header when either
/// contains the other. Headers shorter than three characters only match
/// when they contain the candidate, so placeholder headers like `H` do not
/// swallow every lookup.
#[must_use]
pub fn find_column(headers: &[String], candidates: &[String]) -> Option<usize> {
    let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    candidates.iter().find_map(|candidate| {
        let candidate = candidate.trim().to_lowercase();
        if candidate.is_empty() {
            return None;
        }
        lowered.iter().position(|header| {
            header.contains(&candidate)
                || (header.chars().count() >= 3 && candidate.contains(header.as_str()))
        })
    })
}
