//! `rescue collect`: select eligible rows and harvest each one.

use anyhow::{Context, Result};
use rescue_core::collect::{CollectionPipeline, IntermediateWriter};
use rescue_core::{BrowserSession, Phase, ProgressLedger, RowSelector, SourceTable};
use tracing::{info, warn};

use crate::ProcessExit;
use crate::app::{progress_manager, runtime};
use crate::cli::{Args, CollectArgs};

pub(crate) async fn run(args: &Args, collect: &CollectArgs) -> Result<ProcessExit> {
    let settings = runtime::load_settings(args)?;

    let table = SourceTable::load(&collect.input)?;
    let items = RowSelector::new(&settings.source)
        .select(&table, collect.start_row, collect.num_rows)
        .context("selecting rows")?;
    info!(
        rows = table.rows.len(),
        selected = items.len(),
        "selected eligible rows from {}",
        collect.input.display()
    );
    if items.is_empty() {
        info!("nothing to collect");
        return Ok(ProcessExit::Success);
    }

    std::fs::create_dir_all(&collect.artifacts)
        .with_context(|| format!("creating {}", collect.artifacts.display()))?;
    let artifacts = std::fs::canonicalize(&collect.artifacts)
        .with_context(|| format!("resolving {}", collect.artifacts.display()))?;
    let output = IntermediateWriter::open(&collect.output)?;

    let db = runtime::open_ledger_db(&args.state_dir).await?;
    let ledger = ProgressLedger::new(
        db.clone(),
        Phase::Collect,
        ProgressLedger::scope_for(&collect.input),
    );

    let mut pipeline = CollectionPipeline::new(&settings.collect, &collect.artifacts, &ledger, output)?
        .skip_succeeded(collect.skip_succeeded);
    if let Some(bar) = progress_manager::row_progress(items.len(), args.quiet) {
        pipeline = pipeline.with_progress(bar);
    }

    let mut browser = runtime::start_browser(
        args,
        collect.browser,
        collect.headless,
        Some(&artifacts),
    )
    .await?;
    let outcome = pipeline.run(&mut browser, &items).await;
    if let Err(error) = browser.close().await {
        warn!(%error, "browser session did not close cleanly");
    }
    db.close().await;

    let summary = outcome.context("collection stopped")?;
    info!(
        ok = summary.ok,
        partial = summary.partial,
        failed = summary.failed,
        skipped = summary.skipped,
        "collection finished: {} rows",
        summary.total()
    );
    Ok(ProcessExit::Success)
}
