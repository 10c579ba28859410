//! Append-only progress ledger backing retry and resume.
//!
//! Every processed row gets one entry per attempt. Entries are never
//! updated; the most recent non-skipped entry for a row decides whether
//! it already succeeded. A [`ProgressLedger`] handle is bound to one
//! [`Phase`] and one scope (the canonical path of the input it walks), so
//! rows of different inputs never shadow each other.
//!
//! # Example
//!
//! ```ignore
//! use rescue_core::ledger::{LedgerStatus, NewLedgerEntry, Phase, ProgressLedger};
//! use rescue_core::Database;
//!
//! let db = Database::new(Path::new(".rescue/ledger.db")).await?;
//! let ledger = ProgressLedger::new(db, Phase::Collect, "/data/sites.csv");
//! ledger.record(&NewLedgerEntry::new(4, LedgerStatus::Ok, "done")).await?;
//! assert!(ledger.has_succeeded(4).await?);
//! ```

mod entry;
mod error;

pub use entry::{LedgerEntry, LedgerStatus, NewLedgerEntry, Phase};
pub use error::{LedgerDbErrorKind, LedgerError};

use std::path::Path;

use sqlx::Row;
use tracing::{debug, instrument};

use crate::db::Database;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Ledger handle for one phase over one input.
#[derive(Debug, Clone)]
pub struct ProgressLedger {
    db: Database,
    phase: Phase,
    scope: String,
}

impl ProgressLedger {
    #[must_use]
    pub fn new(db: Database, phase: Phase, scope: impl Into<String>) -> Self {
        Self {
            db,
            phase,
            scope: scope.into(),
        }
    }

    /// Builds the scope string for an input file.
    ///
    /// Uses the canonical path so `./a.csv` and `/abs/a.csv` share a scope;
    /// falls back to the path as given when it cannot be canonicalized.
    #[must_use]
    pub fn scope_for(path: &Path) -> String {
        std::fs::canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
            .to_string()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Appends an entry. The insert is committed before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Database`] if the insert fails.
    #[instrument(skip(self, entry), fields(phase = %self.phase, row = entry.row, status = %entry.status))]
    pub async fn record(&self, entry: &NewLedgerEntry) -> Result<i64> {
        let row_index = to_db_row(entry.row)?;
        let artifacts =
            serde_json::to_string(&entry.artifacts).unwrap_or_else(|_| "[]".to_string());

        let result = sqlx::query(
            r"INSERT INTO ledger_entries (phase, scope, row_index, status, stage, note, artifacts, reference)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?)
              RETURNING id",
        )
        .bind(self.phase.as_str())
        .bind(&self.scope)
        .bind(row_index)
        .bind(entry.status.as_str())
        .bind(&entry.stage)
        .bind(entry.note.as_deref())
        .bind(artifacts)
        .bind(entry.reference.as_deref())
        .fetch_one(self.db.pool())
        .await?;

        let id: i64 = result.get("id");
        debug!(id, stage = %entry.stage, "ledger entry recorded");
        Ok(id)
    }

    /// True when the most recent non-skipped entry for `row` is `ok`.
    ///
    /// `partial` never counts as succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the query fails or the stored status is unreadable.
    #[instrument(skip(self), fields(phase = %self.phase))]
    pub async fn has_succeeded(&self, row: usize) -> Result<bool> {
        Ok(self
            .latest(row)
            .await?
            .map(|entry| entry.status())
            .transpose()?
            == Some(LedgerStatus::Ok))
    }

    /// Row index of the most recently recorded non-skipped entry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Database`] if the query fails.
    #[instrument(skip(self), fields(phase = %self.phase))]
    pub async fn last_processed(&self) -> Result<Option<usize>> {
        let row: Option<(i64,)> = sqlx::query_as(
            r"SELECT row_index FROM ledger_entries
              WHERE phase = ? AND scope = ? AND status != ?
              ORDER BY id DESC
              LIMIT 1",
        )
        .bind(self.phase.as_str())
        .bind(&self.scope)
        .bind(LedgerStatus::Skipped.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.and_then(|(index,)| usize::try_from(index).ok()))
    }

    /// Most recent non-skipped entry for `row`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the query or row conversion fails.
    #[instrument(skip(self), fields(phase = %self.phase))]
    pub async fn latest(&self, row: usize) -> Result<Option<LedgerEntry>> {
        let entry = sqlx::query_as::<_, LedgerEntry>(
            r"SELECT * FROM ledger_entries
              WHERE phase = ? AND scope = ? AND row_index = ? AND status != ?
              ORDER BY id DESC
              LIMIT 1",
        )
        .bind(self.phase.as_str())
        .bind(&self.scope)
        .bind(to_db_row(row)?)
        .bind(LedgerStatus::Skipped.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(entry)
    }

    /// All entries for `row`, oldest first, including skips.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the query or row conversion fails.
    #[instrument(skip(self), fields(phase = %self.phase))]
    pub async fn history(&self, row: usize) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r"SELECT * FROM ledger_entries
              WHERE phase = ? AND scope = ? AND row_index = ?
              ORDER BY id ASC",
        )
        .bind(self.phase.as_str())
        .bind(&self.scope)
        .bind(to_db_row(row)?)
        .fetch_all(self.db.pool())
        .await?;

        Ok(entries)
    }

    /// Distinct row indices with at least one entry, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Database`] if the query fails.
    pub async fn recorded_rows(&self) -> Result<Vec<usize>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r"SELECT DISTINCT row_index FROM ledger_entries
              WHERE phase = ? AND scope = ?
              ORDER BY row_index ASC",
        )
        .bind(self.phase.as_str())
        .bind(&self.scope)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(index,)| usize::try_from(index).ok())
            .collect())
    }
}

fn to_db_row(row: usize) -> Result<i64> {
    i64::try_from(row).map_err(|_| LedgerError::RowOutOfRange(row))
}
