//! Ledger entry types and status definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::LedgerError;

/// Pipeline phase a ledger handle records for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Collect,
    Upload,
    Reconcile,
}

impl Phase {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collect => "collect",
            Self::Upload => "upload",
            Self::Reconcile => "reconcile",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collect" => Ok(Self::Collect),
            "upload" => Ok(Self::Upload),
            "reconcile" => Ok(Self::Reconcile),
            _ => Err(format!("invalid ledger phase: {s}")),
        }
    }
}

/// Outcome of one attempt at one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    /// Every stage completed.
    Ok,
    /// Completed with a non-fatal stage error.
    Partial,
    /// Stopped at a fatal stage error.
    Failed,
    /// Not attempted (resume skip).
    Skipped,
}

impl LedgerStatus {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LedgerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Self::Ok),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("invalid ledger status: {s}")),
        }
    }
}

/// A stored ledger entry.
#[derive(Debug, Clone, FromRow)]
pub struct LedgerEntry {
    /// Insertion order.
    pub id: i64,
    #[sqlx(rename = "phase")]
    pub phase_str: String,
    /// Canonical input path the entry belongs to.
    pub scope: String,
    pub row_index: i64,
    #[sqlx(rename = "status")]
    pub status_str: String,
    /// Stage reached, or the stage that failed.
    pub stage: String,
    pub note: Option<String>,
    /// JSON array of artifact paths.
    #[sqlx(rename = "artifacts")]
    pub artifacts_json: String,
    /// Opaque cross-reference, such as a destination project id.
    pub reference: Option<String>,
    pub recorded_at: String,
}

impl LedgerEntry {
    /// Parses the stored phase.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Corrupt`] for an unknown value.
    pub fn phase(&self) -> Result<Phase, LedgerError> {
        self.phase_str.parse().map_err(|reason| LedgerError::Corrupt {
            id: self.id,
            reason,
        })
    }

    /// Parses the stored status.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Corrupt`] for an unknown value.
    pub fn status(&self) -> Result<LedgerStatus, LedgerError> {
        self.status_str.parse().map_err(|reason| LedgerError::Corrupt {
            id: self.id,
            reason,
        })
    }

    /// Decodes the artifact path list; malformed JSON yields an empty list.
    #[must_use]
    pub fn artifacts(&self) -> Vec<String> {
        serde_json::from_str(&self.artifacts_json).unwrap_or_default()
    }

    /// Row index as stored.
    #[must_use]
    pub fn row(&self) -> usize {
        usize::try_from(self.row_index).unwrap_or_default()
    }
}

/// An entry about to be recorded. The phase and scope come from the ledger handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub row: usize,
    pub status: LedgerStatus,
    pub stage: String,
    pub note: Option<String>,
    pub artifacts: Vec<String>,
    pub reference: Option<String>,
}

impl NewLedgerEntry {
    #[must_use]
    pub fn new(row: usize, status: LedgerStatus, stage: impl Into<String>) -> Self {
        Self {
            row,
            status,
            stage: stage.into(),
            note: None,
            artifacts: Vec::new(),
            reference: None,
        }
    }

    #[must_use]
    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note.filter(|value| !value.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Vec<String>) -> Self {
        self.artifacts = artifacts;
        self
    }

    #[must_use]
    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }
}
