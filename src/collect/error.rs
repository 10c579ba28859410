//! Error types for the collection pipeline.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::browser::BrowserError;
use crate::ledger::LedgerError;

/// Errors raised while collecting one row or running the batch.
///
/// Row-level variants are recorded against the row and the batch moves on;
/// [`CollectError::Ledger`] and [`CollectError::Output`] abort the batch.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Source URL did not answer the reachability probe.
    #[error("source unreachable: {0}")]
    Probe(String),

    /// The page could not be loaded.
    #[error("navigation to {url} failed: {reason}")]
    Navigation {
        url: String,
        reason: String,
    },

    /// Required metadata was not found on the page.
    #[error("metadata missing: {}", missing.join(", "))]
    Extraction {
        /// Names of the fields that were not found.
        missing: Vec<String>,
    },

    /// The page never became stable enough to render.
    #[error("snapshot failed: {0}")]
    Render(String),

    /// No configured export control was present.
    #[error("no export control found on the page")]
    NoExportControl,

    /// The expected files did not appear in time.
    #[error("export did not finish within {timeout:?} ({found} of {expected} files)")]
    ExportTimeout {
        timeout: Duration,
        found: usize,
        expected: usize,
    },

    /// Browser failure outside a stage-specific wait.
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// Filesystem failure writing artifacts.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The intermediate CSV could not be written.
    #[error("intermediate CSV error: {0}")]
    Output(String),

    /// The ledger could not record an outcome.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl CollectError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that stop the whole batch rather than one row.
    #[must_use]
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::Ledger(_) | Self::Output(_))
    }
}

impl From<csv::Error> for CollectError {
    fn from(error: csv::Error) -> Self {
        Self::Output(error.to_string())
    }
}
