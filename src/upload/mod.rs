//! Upload phase: republish collected rows into the archival workspace.
//!
//! Each job moves through `form_filled → files_uploaded → archive_nominated
//! → published`, gated by a one-time sign-in. The publish mode decides the
//! terminal state. Every job leaves exactly one ledger entry per attempt:
//! on success its stage is the state reached, on failure the state that was
//! being attempted. The project id goes into the entry's reference so a
//! later `only-publish` run can pick the project up again.

mod checkpoint;
mod error;
mod job;
mod steps;

pub use checkpoint::{Checkpoint, TerminalCheckpoint};
pub use error::UploadError;
pub use job::{
    SOURCE_ROW_COLUMN, UploadJob, compose_collection_notes, list_upload_files, load_jobs,
    normalize_folder, split_keywords,
};
pub use steps::{StepContext, StepRunner};

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use indicatif::ProgressBar;
use regex::Regex;
use tracing::{debug, info, instrument, trace, warn};

use crate::browser::{BrowserError, BrowserSession, wait_for, wait_for_count, wait_gone};
use crate::config::{DestinationField, UploadSettings};
use crate::ledger::{LedgerEntry, LedgerStatus, NewLedgerEntry, ProgressLedger};
use crate::reconcile::{ReconcileError, ReconciliationRecord, ReconciliationWriter};

/// Ordered publish states of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PublishState {
    FormFilled,
    FilesUploaded,
    ArchiveNominated,
    Published,
}

impl PublishState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FormFilled => "form_filled",
            Self::FilesUploaded => "files_uploaded",
            Self::ArchiveNominated => "archive_nominated",
            Self::Published => "published",
        }
    }

    #[must_use]
    pub fn predecessor(self) -> Option<Self> {
        match self {
            Self::FormFilled => None,
            Self::FilesUploaded => Some(Self::FormFilled),
            Self::ArchiveNominated => Some(Self::FilesUploaded),
            Self::Published => Some(Self::ArchiveNominated),
        }
    }

    /// State a job had reached according to a recorded ledger entry.
    ///
    /// Failed entries name the state that was attempted, so the reached
    /// state is its predecessor.
    #[must_use]
    pub fn reached_by(entry: &LedgerEntry) -> Option<Self> {
        let stage: Self = entry.stage.parse().ok()?;
        match entry.status().ok()? {
            LedgerStatus::Ok | LedgerStatus::Partial => Some(stage),
            LedgerStatus::Failed => stage.predecessor(),
            LedgerStatus::Skipped => None,
        }
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PublishState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "form_filled" => Ok(Self::FormFilled),
            "files_uploaded" => Ok(Self::FilesUploaded),
            "archive_nominated" => Ok(Self::ArchiveNominated),
            "published" => Ok(Self::Published),
            other => Err(format!("unknown publish state: {other}")),
        }
    }
}

/// Which transitions a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PublishMode {
    /// Every transition through `published`.
    #[default]
    Default,
    /// Stop after `archive_nominated`.
    NoPublish,
    /// Only the `published` transition of an already nominated project.
    OnlyPublish,
}

impl PublishMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::NoPublish => "no-publish",
            Self::OnlyPublish => "only-publish",
        }
    }

    /// State a job must reach to count as done.
    #[must_use]
    pub fn terminal(self) -> PublishState {
        match self {
            Self::NoPublish => PublishState::ArchiveNominated,
            Self::Default | Self::OnlyPublish => PublishState::Published,
        }
    }
}

impl fmt::Display for PublishMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Workspace account used for automated sign-in.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Optional identity sent with archive nominations.
#[derive(Debug, Clone, Default)]
pub struct Nominator {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Per-invocation upload options.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub mode: PublishMode,
    /// Base folder the job `path` column is joined onto.
    pub folder: Option<PathBuf>,
    pub credentials: Option<Credentials>,
    /// Overrides the configured nomination form URL.
    pub nomination_url: Option<String>,
    pub nominator: Nominator,
    /// Skip jobs whose latest ledger entry is `ok` at or past the mode's
    /// terminal state.
    pub skip_succeeded: bool,
    /// Label written to the sheet status column on reconciliation.
    pub status_label: String,
}

/// Outcome of one job attempt.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub row: usize,
    pub status: LedgerStatus,
    /// Last state reached, if any.
    pub reached: Option<PublishState>,
    /// State that failed, for failed jobs.
    pub failed_at: Option<PublishState>,
    pub project_id: Option<String>,
    pub error: Option<String>,
    pub notes: Vec<String>,
    /// Emitted when the job reached the mode's terminal state.
    pub reconciliation: Option<ReconciliationRecord>,
}

impl UploadOutcome {
    fn new(row: usize) -> Self {
        Self {
            row,
            status: LedgerStatus::Ok,
            reached: None,
            failed_at: None,
            project_id: None,
            error: None,
            notes: Vec::new(),
            reconciliation: None,
        }
    }

    fn fail(&mut self, target: PublishState, error: &UploadError) {
        self.status = LedgerStatus::Failed;
        self.failed_at = Some(target);
        self.error = Some(error.to_string());
    }

    /// Stage recorded in the ledger.
    #[must_use]
    pub fn stage(&self) -> PublishState {
        self.failed_at
            .or(self.reached)
            .unwrap_or(PublishState::FormFilled)
    }

    #[must_use]
    pub fn ledger_entry(&self) -> NewLedgerEntry {
        let mut note_parts: Vec<String> = self.error.iter().cloned().collect();
        note_parts.extend(self.notes.iter().cloned());
        NewLedgerEntry::new(self.row, self.status, self.stage().as_str())
            .with_note(Some(note_parts.join("; ")))
            .with_reference(self.project_id.clone())
    }
}

/// Job counts for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub ok: usize,
    pub partial: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Sheet rows written back.
    pub reconciled: usize,
    /// Sheet write-backs refused or failed.
    pub reconcile_failed: usize,
}

impl UploadSummary {
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

type StageResult<T> = Result<T, (PublishState, UploadError)>;

fn at<T>(state: PublishState, result: Result<T, UploadError>) -> StageResult<T> {
    result.map_err(|error| (state, error))
}

/// Drives the publish state machine over a batch of jobs.
pub struct UploadPipeline<'a> {
    settings: &'a UploadSettings,
    ledger: &'a ProgressLedger,
    checkpoint: Box<dyn Checkpoint>,
    options: UploadOptions,
    reconciler: Option<ReconciliationWriter>,
    progress: Option<ProgressBar>,
    runner: StepRunner,
    project_id_pattern: Regex,
    signed_in: bool,
}

impl fmt::Debug for UploadPipeline<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadPipeline")
            .field("options", &self.options)
            .field("signed_in", &self.signed_in)
            .finish_non_exhaustive()
    }
}

impl<'a> UploadPipeline<'a> {
    /// Builds a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Configuration`] when the project id pattern
    /// does not compile.
    pub fn new(
        settings: &'a UploadSettings,
        ledger: &'a ProgressLedger,
        checkpoint: Box<dyn Checkpoint>,
        options: UploadOptions,
    ) -> Result<Self, UploadError> {
        let project_id_pattern = Regex::new(&settings.project_id_pattern)
            .map_err(|error| UploadError::Configuration(error.to_string()))?;
        let runner = StepRunner {
            step_timeout: settings.step_timeout(),
            poll: settings.poll_interval(),
            overlay: settings
                .overlay_selector
                .clone()
                .map(|selector| (selector, settings.overlay_timeout())),
        };
        Ok(Self {
            settings,
            ledger,
            checkpoint,
            options,
            reconciler: None,
            progress: None,
            runner,
            project_id_pattern,
            signed_in: false,
        })
    }

    #[must_use]
    pub fn with_reconciler(mut self, writer: ReconciliationWriter) -> Self {
        self.reconciler = Some(writer);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Processes every job in order.
    ///
    /// # Errors
    ///
    /// Only batch-fatal errors are returned: sign-in was refused, the
    /// operator checkpoint broke, or the ledger became unwritable. Job
    /// failures are recorded and counted.
    #[instrument(skip_all, fields(jobs = jobs.len(), mode = %self.options.mode))]
    pub async fn run(
        &mut self,
        browser: &mut dyn BrowserSession,
        jobs: &[UploadJob],
    ) -> Result<UploadSummary, UploadError> {
        let mut summary = UploadSummary::default();

        for job in jobs {
            if let Some(bar) = &self.progress {
                bar.set_message(format!("row {}", job.row));
            }

            if self.options.skip_succeeded && self.finished_for_mode(job.row).await? {
                self.ledger
                    .record(
                        &NewLedgerEntry::new(
                            job.row,
                            LedgerStatus::Skipped,
                            self.options.mode.terminal().as_str(),
                        )
                        .with_note(Some("already uploaded".to_string())),
                    )
                    .await?;
                info!(row = job.row, status = "skipped", "row {} skipped", job.row);
                summary.add(LedgerStatus::Skipped);
                self.tick();
                continue;
            }

            let (outcome, fatal) = self.upload_job(browser, job).await;
            self.ledger.record(&outcome.ledger_entry()).await?;
            log_outcome(&outcome);
            summary.add(outcome.status);
            self.tick();

            if let Some(error) = fatal {
                return Err(error);
            }
            if let Some(record) = &outcome.reconciliation {
                self.reconcile(record, &mut summary).await?;
            }
        }

        Ok(summary)
    }

    /// True when the row already succeeded at or past the state this run's
    /// mode finishes at. A `no-publish` success does not satisfy a
    /// publishing run.
    async fn finished_for_mode(&self, row: usize) -> Result<bool, UploadError> {
        if !self.ledger.has_succeeded(row).await? {
            return Ok(false);
        }
        let reached = self
            .ledger
            .latest(row)
            .await?
            .as_ref()
            .and_then(PublishState::reached_by);
        Ok(reached.is_some_and(|state| state >= self.options.mode.terminal()))
    }

    fn tick(&self) {
        if let Some(bar) = &self.progress {
            bar.inc(1);
        }
    }

    async fn reconcile(
        &mut self,
        record: &ReconciliationRecord,
        summary: &mut UploadSummary,
    ) -> Result<(), UploadError> {
        let Some(writer) = self.reconciler.as_mut() else {
            return Ok(());
        };
        match writer.update(record).await {
            Ok(()) => summary.reconciled += 1,
            Err(ReconcileError::Ledger(error)) => return Err(error.into()),
            Err(error) => {
                debug!(row = record.source_row, error = ?error, "reconciliation refused");
                summary.reconcile_failed += 1;
            }
        }
        Ok(())
    }

    /// Runs one job. Returns the outcome and, separately, a batch-fatal
    /// error that must stop the run after the outcome is recorded.
    #[instrument(skip(self, browser, job), fields(row = job.row))]
    pub async fn upload_job(
        &mut self,
        browser: &mut dyn BrowserSession,
        job: &UploadJob,
    ) -> (UploadOutcome, Option<UploadError>) {
        let mut outcome = UploadOutcome::new(job.row);
        let result = match self.options.mode {
            PublishMode::OnlyPublish => self.publish_existing(browser, job, &mut outcome).await,
            PublishMode::Default | PublishMode::NoPublish => {
                self.publish_new(browser, job, &mut outcome).await
            }
        };

        if let Err((target, error)) = result {
            debug!(row = job.row, %target, error = ?error, "job stopped");
            outcome.fail(target, &error);
            if error.is_batch_fatal() {
                return (outcome, Some(error));
            }
            return (outcome, None);
        }

        if outcome.status == LedgerStatus::Ok && outcome.reached == Some(self.options.mode.terminal())
        {
            outcome.reconciliation = self.reconciliation_record(job, &outcome);
        }
        (outcome, None)
    }

    fn reconciliation_record(
        &self,
        job: &UploadJob,
        outcome: &UploadOutcome,
    ) -> Option<ReconciliationRecord> {
        let project_id = outcome.project_id.as_deref()?;
        Some(ReconciliationRecord {
            source_row: job.source_row?,
            source_url: job.source_url()?.to_string(),
            status: self.options.status_label.clone(),
            published_url: self.settings.published_url(project_id),
        })
    }

    async fn publish_new(
        &mut self,
        browser: &mut dyn BrowserSession,
        job: &UploadJob,
        outcome: &mut UploadOutcome,
    ) -> StageResult<()> {
        use PublishState as State;

        let title = job.title();
        if title.trim().is_empty() {
            return Err((State::FormFilled, UploadError::MissingValue("title".to_string())));
        }
        at(State::FormFilled, self.ensure_signed_in(browser).await)?;

        let project_id = at(State::FormFilled, self.create_project(browser, &title).await)?;
        outcome.project_id = Some(project_id.clone());
        at(State::FormFilled, self.fill_form(browser, job, outcome).await)?;
        outcome.reached = Some(State::FormFilled);

        at(State::FilesUploaded, self.upload_files(browser, job, outcome).await)?;
        outcome.reached = Some(State::FilesUploaded);

        self.nominate(browser, job, outcome).await;
        outcome.reached = Some(State::ArchiveNominated);

        if self.options.mode == PublishMode::NoPublish {
            return Ok(());
        }
        at(State::Published, self.publish(browser, job, &project_id, outcome).await)
    }

    async fn publish_existing(
        &mut self,
        browser: &mut dyn BrowserSession,
        job: &UploadJob,
        outcome: &mut UploadOutcome,
    ) -> StageResult<()> {
        let history = at(
            PublishState::Published,
            self.ledger.history(job.row).await.map_err(UploadError::from),
        )?;
        let prior = history.iter().rev().find_map(|entry| {
            let reference = entry.reference.clone()?;
            PublishState::reached_by(entry).map(|state| (reference, state))
        });

        let Some((project_id, reached)) = prior else {
            return Err((
                PublishState::Published,
                UploadError::InvalidState(format!(
                    "row {} has no recorded project to publish",
                    job.row
                )),
            ));
        };
        if reached < PublishState::ArchiveNominated {
            return Err((
                PublishState::Published,
                UploadError::InvalidState(format!(
                    "row {} only reached {reached}; nominate it before publishing",
                    job.row
                )),
            ));
        }

        outcome.project_id = Some(project_id.clone());
        outcome.reached = Some(reached);
        if reached == PublishState::Published {
            outcome.notes.push("already published".to_string());
            return Ok(());
        }

        at(PublishState::Published, self.ensure_signed_in(browser).await)?;
        at(
            PublishState::Published,
            self.publish(browser, job, &project_id, outcome).await,
        )
    }

    /// Signs in once per run, falling back to the operator.
    async fn ensure_signed_in(&mut self, browser: &mut dyn BrowserSession) -> Result<(), UploadError> {
        if self.signed_in {
            return Ok(());
        }

        let automated = match self.options.credentials.clone() {
            Some(credentials) => match self.sign_in(browser, &credentials).await {
                Ok(()) => true,
                Err(error) => {
                    warn!("automated sign-in failed: {error}");
                    false
                }
            },
            None => false,
        };

        if !automated {
            if let Err(error) = browser.navigate(&self.settings.home_url).await {
                debug!(%error, "could not open the sign-in page");
            }
            let confirmed = self
                .checkpoint
                .confirm("Sign in to the archival workspace in the browser window, then continue.")
                .await?;
            if !confirmed {
                return Err(UploadError::NotAuthenticated);
            }
        }

        self.signed_in = true;
        info!("signed in");
        Ok(())
    }

    async fn sign_in(
        &self,
        browser: &mut dyn BrowserSession,
        credentials: &Credentials,
    ) -> Result<(), UploadError> {
        let settings = self.settings;
        let sign_in = &settings.sign_in;
        let step = |error: BrowserError| UploadError::browser("sign-in", error);

        browser.navigate(&settings.home_url).await.map_err(step)?;
        self.runner
            .run(browser, &sign_in.open_steps, &StepContext::default())
            .await
            .map_err(step)?;
        self.await_verification(browser).await.map_err(step)?;

        for (selector, value) in [
            (&sign_in.username_selector, &credentials.username),
            (&sign_in.password_selector, &credentials.password),
        ] {
            wait_for(browser, selector, settings.step_timeout(), settings.poll_interval())
                .await
                .map_err(step)?;
            browser.fill(selector, value).await.map_err(step)?;
        }
        self.runner
            .run(browser, &sign_in.submit_steps, &StepContext::default())
            .await
            .map_err(step)?;
        self.await_verification(browser).await.map_err(step)
    }

    async fn await_verification(&self, browser: &mut dyn BrowserSession) -> Result<(), BrowserError> {
        wait_gone(
            browser,
            &self.settings.verification_selector,
            self.settings.verification_timeout(),
            self.settings.poll_interval(),
        )
        .await
    }

    async fn create_project(
        &self,
        browser: &mut dyn BrowserSession,
        title: &str,
    ) -> Result<String, UploadError> {
        let step = |error: BrowserError| UploadError::browser("create project", error);
        browser
            .navigate(&self.settings.workspace_url)
            .await
            .map_err(step)?;
        self.await_verification(browser).await.map_err(step)?;
        self.runner
            .run(browser, &self.settings.create_project, &StepContext::with_value(title))
            .await
            .map_err(step)?;

        let url = browser.current_url().await.map_err(step)?;
        let project_id = self
            .project_id_pattern
            .captures(&url)
            .and_then(|captures| captures.get(1))
            .map(|id| id.as_str().to_string())
            .ok_or_else(|| UploadError::ProjectId(url.clone()))?;
        info!(project = %project_id, "project created");
        Ok(project_id)
    }

    async fn fill_form(
        &self,
        browser: &mut dyn BrowserSession,
        job: &UploadJob,
        outcome: &mut UploadOutcome,
    ) -> Result<(), UploadError> {
        let mut context = StepContext::default();
        for field in DestinationField::ALL {
            if let Some(value) = job.first(field) {
                context.fields.insert(field, value.to_string());
            }
        }

        for entry in &self.settings.form {
            let mut values: Vec<String> = job.values(entry.field).to_vec();
            if values.is_empty() {
                if entry.with.iter().any(|field| job.first(*field).is_some()) {
                    values.push(String::new());
                } else {
                    trace!(field = %entry.field, "no value; field left untouched");
                    continue;
                }
            }

            for value in values {
                context.value = value;
                let Err(error) = self.runner.run(browser, &entry.steps, &context).await else {
                    continue;
                };
                if entry.optional {
                    warn!(row = job.row, field = %entry.field, "optional field failed: {error}");
                    outcome
                        .notes
                        .push(format!("{} '{}' not set: {error}", entry.field, context.value));
                } else {
                    return Err(UploadError::browser(format!("field {}", entry.field), error));
                }
            }
        }
        Ok(())
    }

    async fn upload_files(
        &self,
        browser: &mut dyn BrowserSession,
        job: &UploadJob,
        outcome: &mut UploadOutcome,
    ) -> Result<(), UploadError> {
        let Some(folder) = job.folder(self.options.folder.as_deref()) else {
            outcome.notes.push("no folder; nothing attached".to_string());
            return Ok(());
        };
        let files = list_upload_files(&folder)?;
        if files.is_empty() {
            outcome
                .notes
                .push(format!("{} has no files; nothing attached", folder.display()));
            return Ok(());
        }

        let dialog = &self.settings.upload_dialog;
        let settings = self.settings;
        let step = |error: BrowserError| UploadError::browser("upload files", error);
        let no_context = StepContext::default();

        self.runner
            .run(browser, &dialog.open_steps, &no_context)
            .await
            .map_err(step)?;
        for (position, file) in files.iter().enumerate() {
            wait_for(browser, &dialog.file_input, settings.step_timeout(), settings.poll_interval())
                .await
                .map_err(step)?;
            browser.upload(&dialog.file_input, file).await.map_err(step)?;
            wait_for_count(
                browser,
                &dialog.ack_selector,
                position + 1,
                std::time::Duration::from_millis(dialog.ack_timeout_ms),
                settings.poll_interval(),
            )
            .await
            .map_err(step)?;
            debug!(file = %file.display(), "file queued");
        }
        self.runner
            .run(browser, &dialog.close_steps, &no_context)
            .await
            .map_err(step)?;
        info!(row = job.row, files = files.len(), "files uploaded");
        Ok(())
    }

    /// Submits the source URL for archiving. Never blocks the job.
    async fn nominate(
        &self,
        browser: &mut dyn BrowserSession,
        job: &UploadJob,
        outcome: &mut UploadOutcome,
    ) {
        let nomination = &self.settings.nomination;
        let Some(url) = self.options.nomination_url.as_ref().or(nomination.url.as_ref()) else {
            outcome.notes.push("nomination skipped: no form configured".to_string());
            return;
        };
        let Some(source_url) = job.source_url() else {
            outcome.notes.push("nomination skipped: no source URL".to_string());
            return;
        };

        if let Err(error) = self.submit_nomination(browser, url, source_url).await {
            warn!(row = job.row, "nomination failed: {error}");
            outcome.notes.push(format!("nomination failed: {error}"));
        } else {
            debug!(row = job.row, "nomination submitted");
        }
    }

    async fn submit_nomination(
        &self,
        browser: &mut dyn BrowserSession,
        form_url: &str,
        source_url: &str,
    ) -> Result<(), BrowserError> {
        let nomination = &self.settings.nomination;
        let timeout = std::time::Duration::from_millis(nomination.timeout_ms);
        let poll = self.settings.poll_interval();

        browser.navigate(form_url).await?;
        let fields = [
            (Some(&nomination.url_selector), Some(source_url)),
            (
                nomination.name_selector.as_ref(),
                self.options.nominator.name.as_deref(),
            ),
            (
                nomination.email_selector.as_ref(),
                self.options.nominator.email.as_deref(),
            ),
        ];
        for (selector, value) in fields {
            if let (Some(selector), Some(value)) = (selector, value) {
                wait_for(browser, selector, timeout, poll).await?;
                browser.fill(selector, value).await?;
            }
        }
        self.runner
            .run(browser, &nomination.submit_steps, &StepContext::with_value(source_url))
            .await?;
        if let Some(ack) = &nomination.ack_selector {
            wait_for(browser, ack, timeout, poll).await?;
        }
        Ok(())
    }

    async fn publish(
        &mut self,
        browser: &mut dyn BrowserSession,
        job: &UploadJob,
        project_id: &str,
        outcome: &mut UploadOutcome,
    ) -> Result<(), UploadError> {
        let prompt = format!("Publish project {project_id} for row {}?", job.row);
        if !self.checkpoint.confirm(&prompt).await? {
            outcome.status = LedgerStatus::Partial;
            outcome.notes.push("publish declined by operator".to_string());
            return Ok(());
        }

        let step = |error: BrowserError| UploadError::browser("publish", error);
        browser
            .navigate(&self.settings.project_url(project_id))
            .await
            .map_err(step)?;
        self.runner
            .run(browser, &self.settings.publish_steps, &StepContext::with_value(project_id))
            .await
            .map_err(step)?;
        outcome.reached = Some(PublishState::Published);
        info!(row = job.row, project = %project_id, "project published");
        Ok(())
    }
}

fn log_outcome(outcome: &UploadOutcome) {
    match outcome.status {
        LedgerStatus::Failed => info!(
            row = outcome.row,
            status = %outcome.status,
            stage = %outcome.stage(),
            "row {} failed at {}",
            outcome.row,
            outcome.stage()
        ),
        status => info!(
            row = outcome.row,
            status = %status,
            stage = %outcome.stage(),
            "row {} {}",
            outcome.row,
            status
        ),
    }
}
