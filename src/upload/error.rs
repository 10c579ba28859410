//! Error types for the upload pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::browser::BrowserError;
use crate::ledger::LedgerError;

/// Errors that can occur while publishing jobs.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Invocation arguments or input rows are unusable; nothing was started.
    #[error("invalid upload configuration: {0}")]
    Configuration(String),

    /// The requested transition is not allowed from the recorded state.
    #[error("invalid publish state: {0}")]
    InvalidState(String),

    /// A browser step failed.
    #[error("{step} failed: {source}")]
    Browser {
        /// Which flow step was running.
        step: String,
        #[source]
        source: BrowserError,
    },

    /// The job row lacks a value the flow cannot do without.
    #[error("row has no value for {0}")]
    MissingValue(String),

    /// The project id could not be read from the workspace URL.
    #[error("could not read a project id from '{0}'")]
    ProjectId(String),

    /// Sign-in was neither automated nor confirmed by the operator.
    #[error("not signed in to the destination workspace")]
    NotAuthenticated,

    /// The operator checkpoint could not be read.
    #[error("operator checkpoint failed: {0}")]
    Checkpoint(String),

    /// Local file access failed.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The intermediate CSV could not be read.
    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The ledger could not record an outcome.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl UploadError {
    pub(crate) fn browser(step: impl Into<String>, source: BrowserError) -> Self {
        Self::Browser {
            step: step.into(),
            source,
        }
    }

    /// True for errors that stop the whole batch rather than one job.
    #[must_use]
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::NotAuthenticated
                | Self::Checkpoint(_)
                | Self::Ledger(_)
                | Self::Csv { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_error_names_step() {
        let error = UploadError::browser(
            "field summary",
            BrowserError::ElementNotFound("#edit".into()),
        );
        assert_eq!(
            error.to_string(),
            "field summary failed: no element matches '#edit'"
        );
        assert!(!error.is_batch_fatal());
    }

    #[test]
    fn test_invalid_state_is_job_level() {
        let error = UploadError::InvalidState("no nominated project".into());
        assert!(!error.is_batch_fatal());
        assert!(UploadError::NotAuthenticated.is_batch_fatal());
    }
}
