//! `rescue upload`: publish a window of intermediate CSV rows.

use anyhow::{Context, Result};
use rescue_core::{
    BrowserSession, Credentials, CsvRecordSheet, Database, Nominator, Phase, ProgressLedger,
    ReconciliationWriter, ServiceIdentity, Settings, TerminalCheckpoint, UploadError,
    UploadOptions, UploadPipeline, load_jobs,
};
use tracing::{info, warn};

use crate::ProcessExit;
use crate::app::{progress_manager, runtime};
use crate::cli::{Args, UploadArgs};

pub(crate) async fn run(args: &Args, upload: &UploadArgs) -> Result<ProcessExit> {
    let settings = runtime::load_settings(args)?;
    let jobs = load_jobs(
        &upload.csv,
        upload.start_row,
        upload.end_row,
        &settings.field_map,
    )
    .context("loading upload jobs")?;
    let credentials = credentials(upload)?;

    let db = runtime::open_ledger_db(&args.state_dir).await?;
    let reconciler = reconciler(upload, &settings, &db)?;
    let ledger = ProgressLedger::new(
        db.clone(),
        Phase::Upload,
        ProgressLedger::scope_for(&upload.csv),
    );

    let options = UploadOptions {
        mode: upload.publish_mode,
        folder: upload.folder.clone(),
        credentials,
        nomination_url: upload.nomination_url.clone(),
        nominator: Nominator {
            name: upload.nominator_name.clone(),
            email: upload.nominator_email.clone(),
        },
        skip_succeeded: upload.skip_succeeded,
        status_label: settings.reconcile.status_value.clone(),
    };
    let mut pipeline = UploadPipeline::new(
        &settings.upload,
        &ledger,
        Box::new(TerminalCheckpoint),
        options,
    )?;
    if let Some(writer) = reconciler {
        pipeline = pipeline.with_reconciler(writer);
    }
    if let Some(bar) = progress_manager::row_progress(jobs.len(), args.quiet) {
        pipeline = pipeline.with_progress(bar);
    }

    let mut browser = runtime::start_browser(args, upload.browser, false, None).await?;
    let outcome = pipeline.run(&mut browser, &jobs).await;
    if let Err(error) = browser.close().await {
        warn!(%error, "browser session did not close cleanly");
    }
    db.close().await;

    let summary = outcome.context("upload stopped")?;
    info!(
        ok = summary.ok,
        partial = summary.partial,
        failed = summary.failed,
        skipped = summary.skipped,
        reconciled = summary.reconciled,
        reconcile_failed = summary.reconcile_failed,
        "upload finished: {} rows",
        summary.total()
    );
    Ok(ProcessExit::Success)
}

fn credentials(upload: &UploadArgs) -> Result<Option<Credentials>, UploadError> {
    match (&upload.username, &upload.password) {
        (Some(username), Some(password)) => Ok(Some(Credentials {
            username: username.clone(),
            password: password.clone(),
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(UploadError::Configuration(
            "--username needs --password or RESCUE_PASSWORD".to_string(),
        )),
        (None, Some(_)) => Err(UploadError::Configuration(
            "a password was given without --username".to_string(),
        )),
    }
}

fn reconciler(
    upload: &UploadArgs,
    settings: &Settings,
    db: &Database,
) -> Result<Option<ReconciliationWriter>> {
    let Some(sheet_path) = &upload.reconcile_sheet else {
        return Ok(None);
    };
    let Some(credentials_path) = &upload.sheet_credentials else {
        return Err(UploadError::Configuration(
            "--reconcile-sheet needs --sheet-credentials".to_string(),
        )
        .into());
    };

    let identity = ServiceIdentity::load(credentials_path)?;
    let owner = upload
        .claim_owner
        .clone()
        .unwrap_or_else(|| identity.client_email.clone());
    let sheet = CsvRecordSheet::open(
        sheet_path,
        &settings.source,
        settings.reconcile.status_column.as_deref(),
    )?;
    info!(sheet = %sheet_path.display(), owner = %owner, "reconciliation enabled");

    let ledger = ProgressLedger::new(
        db.clone(),
        Phase::Reconcile,
        ProgressLedger::scope_for(sheet_path),
    );
    Ok(Some(
        ReconciliationWriter::new(Box::new(sheet), owner).with_ledger(ledger),
    ))
}
