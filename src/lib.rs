//! Rescue Core Library
//!
//! Moves records describing government-hosted datasets through two phases:
//! harvesting each dataset's landing page and files from the source site,
//! then republishing them into an archival workspace by form automation.
//!
//! # Architecture
//!
//! - [`source`] - Tabular source rows and eligible-row selection
//! - [`browser`] - Browser capability trait and the WebDriver backend
//! - [`collect`] - Collection state machine and intermediate CSV
//! - [`upload`] - Publish state machine over intermediate CSV rows
//! - [`ledger`] - Append-only progress ledger for retry and resume
//! - [`reconcile`] - Guarded write-back into the sheet of record
//! - [`audit`] - Artifact folder audit
//! - [`config`] - TOML settings with defaults for every section
//! - [`db`] - SQLite connection and migrations

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod audit;
pub mod browser;
pub mod collect;
pub mod config;
pub mod db;
pub mod ledger;
pub mod reconcile;
pub mod source;
pub mod upload;
mod user_agent;

// Re-export commonly used types
pub use audit::{AuditError, AuditFinding, AuditReport, audit};
pub use browser::{BrowserError, BrowserKind, BrowserSession, WebDriverOptions, WebDriverSession};
pub use collect::{CollectError, CollectSummary, CollectionPipeline, IntermediateWriter};
pub use config::{ConfigError, Settings};
pub use db::{Database, DbError};
pub use ledger::{LedgerError, LedgerStatus, NewLedgerEntry, Phase, ProgressLedger};
pub use reconcile::{
    CsvRecordSheet, ReconcileError, ReconciliationRecord, ReconciliationWriter, ServiceIdentity,
};
pub use source::{RowSelector, SelectError, SourceTable, WorkItem};
pub use upload::{
    Checkpoint, Credentials, Nominator, PublishMode, PublishState, TerminalCheckpoint,
    UploadError, UploadJob, UploadOptions, UploadPipeline, UploadSummary, load_jobs,
};
