//! Collection phase: harvest landing-page metadata, a PDF snapshot and the
//! exported dataset files for each selected row.
//!
//! Each row walks `start → metadata_fetched → snapshot_rendered →
//! dataset_exported → done`. A fatal stage error stops that row only; its
//! outcome is written to the intermediate CSV and the ledger before the
//! next row starts, so an interrupted batch loses at most the row in flight.
//!
//! Missing title or summary is not fatal: the row continues and ends
//! `partial`.

mod artifacts;
mod error;
mod output;
mod probe;

pub use artifacts::{DirListing, allocate_row_dir, is_in_progress, list_files, sanitize_file_stem};
pub use error::CollectError;
pub use output::{INTERMEDIATE_COLUMNS, IntermediateWriter};
pub use probe::Probe;

use std::fmt;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, instrument, trace, warn};

use crate::browser::{BrowserSession, wait_for, wait_gone, wait_ready};
use crate::config::CollectSettings;
use crate::ledger::{LedgerStatus, NewLedgerEntry, ProgressLedger};
use crate::source::WorkItem;

/// Where a row is in the collection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CollectionStage {
    Start,
    MetadataFetched,
    SnapshotRendered,
    DatasetExported,
    Done,
}

impl CollectionStage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::MetadataFetched => "metadata_fetched",
            Self::SnapshotRendered => "snapshot_rendered",
            Self::DatasetExported => "dataset_exported",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CollectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of collecting one row. Written once, never patched.
#[derive(Debug, Clone)]
pub struct CollectionResult {
    pub index: usize,
    pub source_url: String,
    pub title: String,
    pub office: String,
    pub agency: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub artifact_dir: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    pub files: Vec<PathBuf>,
    /// `ok`, `partial` or `failed`.
    pub status: LedgerStatus,
    /// `done` unless the row failed, then the failing stage.
    pub stage: CollectionStage,
    pub error: Option<String>,
    /// Informational remarks that do not affect the status.
    pub notes: Vec<String>,
    /// Local date the files were harvested, `YYYY-MM-DD`.
    pub download_date: String,
}

impl CollectionResult {
    fn new(item: &WorkItem) -> Self {
        Self {
            index: item.index,
            source_url: item.source_url.clone(),
            title: item.title.clone(),
            office: item.office.clone(),
            agency: item.agency.clone(),
            summary: String::new(),
            keywords: Vec::new(),
            artifact_dir: None,
            snapshot: None,
            files: Vec::new(),
            status: LedgerStatus::Ok,
            stage: CollectionStage::Start,
            error: None,
            notes: Vec::new(),
            download_date: chrono::Local::now().format("%Y-%m-%d").to_string(),
        }
    }

    fn add_error(&mut self, message: String) {
        self.error = Some(match self.error.take() {
            Some(previous) => format!("{previous}; {message}"),
            None => message,
        });
    }

    fn fail(&mut self, stage: CollectionStage, error: &CollectError) {
        self.status = LedgerStatus::Failed;
        self.stage = stage;
        self.add_error(error.to_string());
    }

    /// Ledger entry describing this result.
    #[must_use]
    pub fn ledger_entry(&self) -> NewLedgerEntry {
        let mut note_parts: Vec<String> = self.error.iter().cloned().collect();
        note_parts.extend(self.notes.iter().cloned());
        let artifacts = self
            .snapshot
            .iter()
            .chain(self.files.iter())
            .map(|path| path.display().to_string())
            .collect();

        NewLedgerEntry::new(self.index, self.status, self.stage.as_str())
            .with_note(Some(note_parts.join("; ")))
            .with_artifacts(artifacts)
            .with_reference(self.artifact_dir.as_ref().map(|d| d.display().to_string()))
    }
}

/// Row counts for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectSummary {
    pub ok: usize,
    pub partial: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl CollectSummary {
    fn add(&mut self, status: LedgerStatus) {
        match status {
            LedgerStatus::Ok => self.ok += 1,
            LedgerStatus::Partial => self.partial += 1,
            LedgerStatus::Failed => self.failed += 1,
            LedgerStatus::Skipped => self.skipped += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.ok + self.partial + self.failed + self.skipped
    }
}

/// Drives the collection state machine over a batch of work items.
#[derive(Debug)]
pub struct CollectionPipeline<'a> {
    settings: &'a CollectSettings,
    artifacts_root: PathBuf,
    ledger: &'a ProgressLedger,
    output: IntermediateWriter,
    probe: Option<Probe>,
    skip_succeeded: bool,
    progress: Option<ProgressBar>,
}

impl<'a> CollectionPipeline<'a> {
    /// Builds a pipeline writing artifacts under `artifacts_root`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Probe`] when probing is enabled and the HTTP
    /// client cannot be built.
    pub fn new(
        settings: &'a CollectSettings,
        artifacts_root: impl Into<PathBuf>,
        ledger: &'a ProgressLedger,
        output: IntermediateWriter,
    ) -> Result<Self, CollectError> {
        let probe = if settings.probe {
            Some(Probe::new(settings.probe_timeout())?)
        } else {
            None
        };
        Ok(Self {
            settings,
            artifacts_root: artifacts_root.into(),
            ledger,
            output,
            probe,
            skip_succeeded: false,
            progress: None,
        })
    }

    /// Skips rows whose latest ledger entry is `ok`.
    #[must_use]
    pub fn skip_succeeded(mut self, skip: bool) -> Self {
        self.skip_succeeded = skip;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Collects every item in order.
    ///
    /// # Errors
    ///
    /// Only batch-fatal errors are returned: the ledger or the intermediate
    /// CSV became unwritable. Row failures are recorded and counted.
    #[instrument(skip_all, fields(rows = items.len()))]
    pub async fn run(
        &mut self,
        browser: &mut dyn BrowserSession,
        items: &[WorkItem],
    ) -> Result<CollectSummary, CollectError> {
        let mut summary = CollectSummary::default();

        for item in items {
            if let Some(bar) = &self.progress {
                bar.set_message(format!("row {}", item.index));
            }

            if self.skip_succeeded && self.ledger.has_succeeded(item.index).await? {
                self.ledger
                    .record(
                        &NewLedgerEntry::new(
                            item.index,
                            LedgerStatus::Skipped,
                            CollectionStage::Start.as_str(),
                        )
                        .with_note(Some("already collected".to_string())),
                    )
                    .await?;
                info!(row = item.index, status = "skipped", "row {} skipped", item.index);
                summary.add(LedgerStatus::Skipped);
                self.tick();
                continue;
            }

            let result = self.collect_row(browser, item).await;
            self.output.append(&result)?;
            self.ledger.record(&result.ledger_entry()).await?;
            log_outcome(&result);
            summary.add(result.status);
            self.tick();
        }

        Ok(summary)
    }

    fn tick(&self) {
        if let Some(bar) = &self.progress {
            bar.inc(1);
        }
    }

    /// Runs every stage for one row; never fails, failures land in the result.
    #[instrument(skip(self, browser, item), fields(row = item.index))]
    pub async fn collect_row(
        &self,
        browser: &mut dyn BrowserSession,
        item: &WorkItem,
    ) -> CollectionResult {
        let mut result = CollectionResult::new(item);
        if let Err((stage, error)) = self.run_stages(browser, item, &mut result).await {
            debug!(row = item.index, %stage, error = ?error, "row stopped");
            result.fail(stage, &error);
        }
        result
    }

    async fn run_stages(
        &self,
        browser: &mut dyn BrowserSession,
        item: &WorkItem,
        result: &mut CollectionResult,
    ) -> Result<(), (CollectionStage, CollectError)> {
        use CollectionStage as Stage;

        if let Some(probe) = &self.probe {
            probe
                .check(&item.source_url)
                .await
                .map_err(|error| (Stage::Start, error))?;
        }

        let dir = allocate_row_dir(&self.artifacts_root, item.index)
            .map_err(|error| (Stage::Start, CollectError::io(&self.artifacts_root, error)))?;
        result.artifact_dir = Some(dir.clone());

        self.fetch_metadata(browser, item, result)
            .await
            .map_err(|error| (Stage::MetadataFetched, error))?;
        self.render_snapshot(browser, &dir, result)
            .await
            .map_err(|error| (Stage::SnapshotRendered, error))?;
        self.export_dataset(browser, &dir, result)
            .await
            .map_err(|error| (Stage::DatasetExported, error))?;

        result.stage = Stage::Done;
        Ok(())
    }

    async fn fetch_metadata(
        &self,
        browser: &mut dyn BrowserSession,
        item: &WorkItem,
        result: &mut CollectionResult,
    ) -> Result<(), CollectError> {
        let settings = self.settings;
        match timeout(settings.navigation_timeout(), browser.navigate(&item.source_url)).await {
            Err(_) => {
                return Err(CollectError::Navigation {
                    url: item.source_url.clone(),
                    reason: format!("no response within {:?}", settings.navigation_timeout()),
                });
            }
            Ok(Err(error)) => {
                return Err(CollectError::Navigation {
                    url: item.source_url.clone(),
                    reason: error.to_string(),
                });
            }
            Ok(Ok(())) => {}
        }
        sleep(settings.settle()).await;

        let expanded = browser
            .click_matching_text(
                &settings.expand_selector,
                &settings.expand_keywords,
                settings.expand_limit,
            )
            .await
            .unwrap_or_else(|error| {
                debug!(%error, "expanding truncated content failed");
                0
            });
        if expanded > 0 {
            debug!(expanded, "expanded truncated content");
            sleep(settings.settle()).await;
        }

        let mut missing = Vec::new();
        match first_text(browser, &settings.title_selectors).await {
            Some(title) => result.title = title,
            None => missing.push("title".to_string()),
        }
        match first_text(browser, &settings.summary_selectors).await {
            Some(summary) => result.summary = summary,
            None => missing.push("summary".to_string()),
        }
        result.keywords = first_texts(browser, &settings.keyword_selectors).await;

        if !missing.is_empty() {
            let error = CollectError::Extraction { missing };
            warn!(row = result.index, "{error}");
            result.status = LedgerStatus::Partial;
            result.add_error(error.to_string());
        }
        Ok(())
    }

    async fn render_snapshot(
        &self,
        browser: &mut dyn BrowserSession,
        dir: &Path,
        result: &mut CollectionResult,
    ) -> Result<(), CollectError> {
        let settings = self.settings;
        let page_size = settings.page_size;
        let script = settings
            .page_size_script
            .replace("{page_size}", &page_size.to_string());
        match browser.run_script(&script).await {
            Ok(outcome) => trace!(?outcome, "page size script"),
            Err(error) => debug!(%error, "page size script failed"),
        }
        sleep(settings.settle()).await;

        if let Ok(total) = browser.run_script(&settings.total_rows_script).await
            && let Some(total) = total.as_u64()
            && total > u64::from(page_size)
        {
            result
                .notes
                .push(format!("table has {total} rows; snapshot shows the first {page_size}"));
        }

        let render_error = |error: crate::browser::BrowserError| CollectError::Render(error.to_string());
        wait_ready(browser, settings.render_timeout(), settings.poll_interval())
            .await
            .map_err(render_error)?;
        if let Some(busy) = &settings.busy_selector {
            wait_gone(browser, busy, settings.render_timeout(), settings.poll_interval())
                .await
                .map_err(render_error)?;
        }

        let bytes = timeout(settings.render_timeout(), browser.render_pdf())
            .await
            .map_err(|_| CollectError::Render("print did not finish in time".to_string()))?
            .map_err(render_error)?;

        let stem = if result.title.trim().is_empty() {
            "snapshot".to_string()
        } else {
            sanitize_file_stem(&result.title)
        };
        let path = dir.join(format!("{stem}.pdf"));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|error| CollectError::io(&path, error))?;
        debug!(path = %path.display(), "snapshot written");
        result.snapshot = Some(path);
        Ok(())
    }

    async fn export_dataset(
        &self,
        browser: &mut dyn BrowserSession,
        dir: &Path,
        result: &mut CollectionResult,
    ) -> Result<(), CollectError> {
        let settings = self.settings;
        browser.set_download_dir(dir).await?;

        let mut clicked = 0;
        for selector in &settings.export_selectors {
            if wait_for(browser, selector, settings.settle(), settings.poll_interval())
                .await
                .is_err()
            {
                trace!(selector, "export control not present");
                continue;
            }
            match browser.click(selector).await {
                Ok(()) => clicked += 1,
                Err(error) => debug!(selector, %error, "export control click failed"),
            }
        }
        if clicked == 0 {
            return Err(CollectError::NoExportControl);
        }

        let ignore: Vec<PathBuf> = result.snapshot.iter().cloned().collect();
        let expected = settings.expected_exports;
        let deadline = Instant::now() + settings.export_timeout();
        loop {
            let listing = list_files(dir, &ignore).map_err(|error| CollectError::io(dir, error))?;
            if listing.in_progress == 0 && listing.complete.len() >= expected {
                result.files = listing.complete;
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(CollectError::ExportTimeout {
                    timeout: settings.export_timeout(),
                    found: listing.complete.len(),
                    expected,
                });
            }
            sleep(settings.poll_interval()).await;
        }
    }
}

/// First non-blank text found across `selectors`, tried in order.
async fn first_text(browser: &mut dyn BrowserSession, selectors: &[String]) -> Option<String> {
    for selector in selectors {
        match browser.extract_text(selector).await {
            Ok(texts) => {
                if let Some(text) = texts
                    .into_iter()
                    .map(|text| text.trim().to_string())
                    .find(|text| !text.is_empty())
                {
                    return Some(text);
                }
            }
            Err(error) => trace!(selector, %error, "lookup failed"),
        }
    }
    None
}

/// Every non-blank text of the first selector that yields any, de-duplicated.
async fn first_texts(browser: &mut dyn BrowserSession, selectors: &[String]) -> Vec<String> {
    for selector in selectors {
        let Ok(texts) = browser.extract_text(selector).await else {
            continue;
        };
        let mut values: Vec<String> = Vec::new();
        for text in texts {
            let text = text.trim().to_string();
            if !text.is_empty() && !values.contains(&text) {
                values.push(text);
            }
        }
        if !values.is_empty() {
            return values;
        }
    }
    Vec::new()
}

fn log_outcome(result: &CollectionResult) {
    match result.status {
        LedgerStatus::Failed => info!(
            row = result.index,
            status = %result.status,
            stage = %result.stage,
            "row {} failed at {}",
            result.index,
            result.stage
        ),
        status => info!(
            row = result.index,
            status = %status,
            "row {} {}",
            result.index,
            status
        ),
    }
}
