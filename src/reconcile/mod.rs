//! Writes publish outcomes back into the sheet of record.
//!
//! The sheet is shared with other people, so every write is guarded: the
//! target row must still carry the same source URL, must not have changed
//! since the sheet was loaded, and must not be claimed yet. A guarded write
//! that fails leaves the sheet exactly as it was.

mod sheet;

pub use sheet::{CsvRecordSheet, RecordSheet, RowUpdate};

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::ledger::{LedgerError, LedgerStatus, NewLedgerEntry, ProgressLedger};

/// Errors raised while reconciling.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The row no longer matches what was loaded; nothing was written.
    #[error("sheet row {row} conflicts: {reason}")]
    Conflict { row: usize, reason: String },

    /// The referenced row does not exist in the sheet.
    #[error("sheet has no data row {0}")]
    RowMissing(usize),

    /// Reconciliation is set up inconsistently.
    #[error("invalid reconciliation setup: {0}")]
    Configuration(String),

    /// The service identity file is unusable.
    #[error("unusable sheet credentials '{path}': {reason}")]
    Credentials { path: PathBuf, reason: String },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A published job, ready to be written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationRecord {
    /// Zero-based data row in the sheet of record.
    pub source_row: usize,
    pub source_url: String,
    /// Label written to the status column.
    pub status: String,
    pub published_url: String,
}

/// Service identity used to claim rows.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceIdentity {
    pub client_email: String,
}

impl ServiceIdentity {
    /// Reads a service identity JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Credentials`] when the file is unreadable,
    /// not JSON, or has a blank `client_email`.
    pub fn load(path: &Path) -> Result<Self, ReconcileError> {
        let credentials = |reason: String| ReconcileError::Credentials {
            path: path.to_path_buf(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|error| credentials(error.to_string()))?;
        let identity: Self =
            serde_json::from_str(&raw).map_err(|error| credentials(error.to_string()))?;
        if identity.client_email.trim().is_empty() {
            return Err(credentials("client_email is blank".to_string()));
        }
        Ok(identity)
    }
}

/// Applies reconciliation records to a [`RecordSheet`].
pub struct ReconciliationWriter {
    sheet: Box<dyn RecordSheet>,
    claim_owner: String,
    ledger: Option<ProgressLedger>,
}

impl std::fmt::Debug for ReconciliationWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationWriter")
            .field("claim_owner", &self.claim_owner)
            .finish_non_exhaustive()
    }
}

impl ReconciliationWriter {
    #[must_use]
    pub fn new(sheet: Box<dyn RecordSheet>, claim_owner: impl Into<String>) -> Self {
        Self {
            sheet,
            claim_owner: claim_owner.into(),
            ledger: None,
        }
    }

    /// Also records every attempt in a `reconcile` ledger.
    #[must_use]
    pub fn with_ledger(mut self, ledger: ProgressLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    #[must_use]
    pub fn claim_owner(&self) -> &str {
        &self.claim_owner
    }

    /// Claims the record's sheet row and stores the published URL.
    ///
    /// # Errors
    ///
    /// Returns the sheet's error, most notably [`ReconcileError::Conflict`].
    /// The attempt is recorded in the ledger either way.
    #[instrument(skip(self, record), fields(row = record.source_row))]
    pub async fn update(&mut self, record: &ReconciliationRecord) -> Result<(), ReconcileError> {
        let update = RowUpdate {
            row: record.source_row,
            source_url: record.source_url.clone(),
            claim_owner: self.claim_owner.clone(),
            download_location: record.published_url.clone(),
            status: Some(record.status.clone()).filter(|status| !status.is_empty()),
        };
        let outcome = self.sheet.apply(&update);

        if let Some(ledger) = &self.ledger {
            let entry = match &outcome {
                Ok(()) => NewLedgerEntry::new(record.source_row, LedgerStatus::Ok, "reconciled")
                    .with_reference(Some(record.published_url.clone())),
                Err(error) => {
                    NewLedgerEntry::new(record.source_row, LedgerStatus::Failed, "reconciled")
                        .with_note(Some(error.to_string()))
                }
            };
            ledger.record(&entry).await?;
        }

        match &outcome {
            Ok(()) => info!(row = record.source_row, "sheet row {} reconciled", record.source_row),
            Err(error) => warn!(row = record.source_row, "{error}"),
        }
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::ledger::Phase;

    struct Recording {
        updates: Vec<RowUpdate>,
        refuse: bool,
    }

    impl RecordSheet for Recording {
        fn apply(&mut self, update: &RowUpdate) -> Result<(), ReconcileError> {
            if self.refuse {
                return Err(ReconcileError::Conflict {
                    row: update.row,
                    reason: "claimed".to_string(),
                });
            }
            self.updates.push(update.clone());
            Ok(())
        }
    }

    fn record() -> ReconciliationRecord {
        ReconciliationRecord {
            source_row: 4,
            source_url: "https://data.cdc.gov/x".to_string(),
            status: "Done".to_string(),
            published_url: "https://archive.example/p/1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_update_records_outcome_in_ledger() {
        let db = Database::new_in_memory().await.unwrap();
        let ledger = ProgressLedger::new(db, Phase::Reconcile, "sheet.csv");
        let sheet = Recording {
            updates: Vec::new(),
            refuse: false,
        };
        let mut writer = ReconciliationWriter::new(Box::new(sheet), "bot@example.org")
            .with_ledger(ledger.clone());

        writer.update(&record()).await.unwrap();

        let latest = ledger.latest(4).await.unwrap().unwrap();
        assert_eq!(latest.status().unwrap(), LedgerStatus::Ok);
        assert_eq!(latest.reference.as_deref(), Some("https://archive.example/p/1"));
    }

    #[tokio::test]
    async fn test_conflict_is_returned_and_recorded() {
        let db = Database::new_in_memory().await.unwrap();
        let ledger = ProgressLedger::new(db, Phase::Reconcile, "sheet.csv");
        let sheet = Recording {
            updates: Vec::new(),
            refuse: true,
        };
        let mut writer =
            ReconciliationWriter::new(Box::new(sheet), "bot").with_ledger(ledger.clone());

        let error = writer.update(&record()).await.unwrap_err();
        assert!(matches!(error, ReconcileError::Conflict { .. }));
        assert_eq!(
            ledger.latest(4).await.unwrap().unwrap().status().unwrap(),
            LedgerStatus::Failed
        );
    }

    #[test]
    fn test_service_identity_requires_client_email() {
        let temp = tempfile::tempdir().unwrap();
        let good = temp.path().join("good.json");
        std::fs::write(&good, r#"{"type":"service_account","client_email":"bot@p.iam"}"#).unwrap();
        assert_eq!(ServiceIdentity::load(&good).unwrap().client_email, "bot@p.iam");

        let bad = temp.path().join("bad.json");
        std::fs::write(&bad, r#"{"client_email":"  "}"#).unwrap();
        assert!(matches!(
            ServiceIdentity::load(&bad),
            Err(ReconcileError::Credentials { .. })
        ));
    }
}
