//! Artifact folder audit: finds row folders holding an unexpected number
//! of files and ties each back to its intermediate CSV row.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument};

/// Column holding the artifact folder of a row.
pub const PATH_COLUMN: &str = "path";
/// Column holding the source URL of a row.
pub const URL_COLUMN: &str = "7_original_distribution_url";
/// Column holding the destination project id, when known.
pub const PROJECT_ID_COLUMN: &str = "datalumos_id";

const NOT_FOUND: &str = "NOT FOUND";

/// Errors raised while auditing.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The CSV lacks a required column.
    #[error("'{column}' column not found in {path}")]
    MissingColumn { column: &'static str, path: PathBuf },

    #[error("malformed CSV in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One folder whose entry count differs from the expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFinding {
    pub folder_name: String,
    pub folder_path: PathBuf,
    pub file_count: usize,
    /// Source URL, or `NOT FOUND` when no CSV row names the folder.
    pub url: String,
    /// Project id, `N/A` when the row has none, `NOT FOUND` without a row.
    pub project_id: String,
}

/// Result of one audit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Folders inspected.
    pub scanned: usize,
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    /// Writes the tab-separated report.
    ///
    /// # Errors
    ///
    /// Returns the writer's error.
    pub fn write_tsv<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "Folder Name\tNumber of Files\tURL\tdatalumos_id")?;
        writeln!(out, "{}", "-".repeat(100))?;
        for finding in &self.findings {
            writeln!(
                out,
                "{}\t{}\t{}\t{}",
                finding.folder_name, finding.file_count, finding.url, finding.project_id
            )?;
        }
        out.flush()
    }
}

#[derive(Clone)]
struct RowRef {
    url: String,
    project_id: Option<String>,
}

/// Scans every subfolder of `base` and reports those whose entry count is
/// not `expected_files`.
///
/// # Errors
///
/// Returns [`AuditError`] when the CSV or the base folder cannot be read,
/// or the CSV lacks the `path` or source URL column.
#[instrument(skip_all, fields(base = %base.display(), csv = %csv_path.display(), expected_files = expected_files))]
pub fn audit(base: &Path, csv_path: &Path, expected_files: usize) -> Result<AuditReport, AuditError> {
    let rows = load_rows(csv_path)?;
    debug!(rows = rows.len(), "loaded path mappings");

    let io_error = |path: &Path, source| AuditError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut folders = Vec::new();
    for entry in std::fs::read_dir(base).map_err(|error| io_error(base, error))? {
        let entry = entry.map_err(|error| io_error(base, error))?;
        if entry.file_type().map_err(|error| io_error(base, error))?.is_dir() {
            folders.push(entry.path());
        }
    }
    folders.sort();

    let mut report = AuditReport {
        scanned: folders.len(),
        findings: Vec::new(),
    };
    for folder in folders {
        let file_count = std::fs::read_dir(&folder)
            .map_err(|error| io_error(&folder, error))?
            .count();
        if file_count == expected_files {
            continue;
        }

        let found = rows
            .get(&folder.display().to_string())
            .or_else(|| rows.get(&normalize_key(&folder.display().to_string())));
        let (url, project_id) = match found {
            Some(row) => (
                row.url.clone(),
                row.project_id.clone().unwrap_or_else(|| "N/A".to_string()),
            ),
            None => (NOT_FOUND.to_string(), NOT_FOUND.to_string()),
        };
        report.findings.push(AuditFinding {
            folder_name: folder
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            folder_path: folder,
            file_count,
            url,
            project_id,
        });
    }

    info!(
        scanned = report.scanned,
        issues = report.findings.len(),
        "audit finished"
    );
    Ok(report)
}

/// `/`-separated form without a leading `./`.
fn normalize_key(path: &str) -> String {
    let slashed = path.trim().replace('\\', "/");
    slashed
        .strip_prefix("./")
        .map_or_else(|| slashed.clone(), str::to_string)
}

fn load_rows(csv_path: &Path) -> Result<HashMap<String, RowRef>, AuditError> {
    let csv_error = |source| AuditError::Csv {
        path: csv_path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(csv_path)
        .map_err(csv_error)?;
    let headers = reader.headers().map_err(csv_error)?.clone();
    let position = |name: &str| headers.iter().position(|header| header.trim() == name);
    let missing = |column| AuditError::MissingColumn {
        column,
        path: csv_path.to_path_buf(),
    };
    let path_at = position(PATH_COLUMN).ok_or_else(|| missing(PATH_COLUMN))?;
    let url_at = position(URL_COLUMN).ok_or_else(|| missing(URL_COLUMN))?;
    let id_at = position(PROJECT_ID_COLUMN);

    let mut rows = HashMap::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let path = record.get(path_at).unwrap_or_default().trim();
        if path.is_empty() {
            continue;
        }
        let project_id = id_at
            .and_then(|at| record.get(at))
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| id.strip_suffix(".0").unwrap_or(id).to_string());
        let row = RowRef {
            url: record.get(url_at).unwrap_or_default().trim().to_string(),
            project_id,
        };
        let normalized = normalize_key(path);
        if normalized != path {
            rows.insert(normalized, row.clone());
        }
        rows.insert(path.to_string(), row);
    }
    Ok(rows)
}
