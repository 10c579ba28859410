//! Append-only writer for the intermediate CSV handed to the upload phase.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::{CollectError, CollectionResult};

/// Intermediate CSV header, in column order.
pub const INTERMEDIATE_COLUMNS: [&str; 15] = [
    "source_row",
    "7_original_distribution_url",
    "4_pre_title",
    "4_title",
    "5_agency",
    "5_agency2",
    "6_summary_description",
    "8_keywords",
    "12_download_date_original_source",
    "path",
    "snapshot",
    "files",
    "status",
    "stage",
    "error",
];

/// Writes one CSV row per collected row, flushing after each.
///
/// Opening an existing non-empty file appends below its header; the header
/// must match [`INTERMEDIATE_COLUMNS`].
#[derive(Debug)]
pub struct IntermediateWriter {
    path: PathBuf,
    writer: csv::Writer<std::fs::File>,
}

impl IntermediateWriter {
    /// Opens `path` for appending, writing the header when the file is new or empty.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Output`] on a header mismatch and
    /// [`CollectError::Io`] when the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, CollectError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CollectError::io(parent, e))?;
        }

        let needs_header = match std::fs::metadata(path) {
            Ok(meta) if meta.len() > 0 => {
                check_header(path)?;
                false
            }
            _ => true,
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| CollectError::io(path, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(INTERMEDIATE_COLUMNS)?;
            writer.flush().map_err(|e| CollectError::io(path, e))?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one result and flushes it to disk.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Output`] or [`CollectError::Io`].
    pub fn append(&mut self, result: &CollectionResult) -> Result<(), CollectError> {
        let display = |path: &Option<PathBuf>| {
            path.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        let files = result
            .files
            .iter()
            .filter_map(|file| file.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(";");

        self.writer.write_record([
            result.index.to_string(),
            result.source_url.clone(),
            String::new(),
            result.title.clone(),
            result.office.clone(),
            result.agency.clone(),
            result.summary.clone(),
            result.keywords.join(", "),
            result.download_date.clone(),
            display(&result.artifact_dir),
            display(&result.snapshot),
            files,
            result.status.to_string(),
            result.stage.to_string(),
            result.error.clone().unwrap_or_default(),
        ])?;
        self.writer
            .flush()
            .map_err(|e| CollectError::io(&self.path, e))
    }
}

fn check_header(path: &Path) -> Result<(), CollectError> {
    let file = std::fs::File::open(path).map_err(|e| CollectError::io(path, e))?;
    let mut first = String::new();
    BufReader::new(file)
        .read_line(&mut first)
        .map_err(|e| CollectError::io(path, e))?;
    let found: Vec<&str> = first
        .trim_end_matches(['\r', '\n'])
        .trim_start_matches('\u{feff}')
        .split(',')
        .collect();
    if found == INTERMEDIATE_COLUMNS {
        Ok(())
    } else {
        Err(CollectError::Output(format!(
            "{} exists with a different header; choose another --output",
            path.display()
        )))
    }
}
