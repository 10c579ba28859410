//! Subcommand dispatch and shared run setup.

use std::path::Path;

use anyhow::{Context, Result};
use rescue_core::{BrowserKind, Database, Settings, WebDriverOptions, WebDriverSession};
use tracing::{debug, info};

use crate::ProcessExit;
use crate::app::{audit_command, collect_command, upload_command};
use crate::cli::{Args, Command};

/// File name of the ledger inside the state directory.
pub(crate) const LEDGER_FILE: &str = "ledger.db";

pub(crate) async fn run(args: Args) -> Result<ProcessExit> {
    debug!(?args, "CLI arguments parsed");

    match &args.command {
        Command::Collect(collect) => collect_command::run(&args, collect).await,
        Command::Upload(upload) => upload_command::run(&args, upload).await,
        Command::Audit(audit) => audit_command::run(audit),
    }
}

/// Loads settings from `--config` or the default location.
pub(crate) fn load_settings(args: &Args) -> Result<Settings> {
    let settings = Settings::load(args.config.as_deref()).context("loading configuration")?;
    Ok(settings)
}

/// Opens the ledger database under `--state-dir`, creating the directory.
pub(crate) async fn open_ledger_db(state_dir: &Path) -> Result<Database> {
    std::fs::create_dir_all(state_dir)
        .with_context(|| format!("creating state directory {}", state_dir.display()))?;
    let path = state_dir.join(LEDGER_FILE);
    let db = Database::new(&path)
        .await
        .with_context(|| format!("opening ledger {}", path.display()))?;
    debug!(path = %path.display(), "ledger opened");
    Ok(db)
}

/// Starts the browser session, after every pre-flight check passed.
pub(crate) async fn start_browser(
    args: &Args,
    kind: BrowserKind,
    headless: bool,
    download_dir: Option<&Path>,
) -> Result<WebDriverSession> {
    let mut options = WebDriverOptions::new(kind);
    if let Some(endpoint) = &args.webdriver_url {
        options.endpoint.clone_from(endpoint);
    }
    options.headless = headless;
    options.download_dir = download_dir.map(Path::to_path_buf);

    let session = WebDriverSession::start(&options)
        .await
        .with_context(|| format!("starting {kind} via {}", options.endpoint))?;
    info!(browser = %kind, "browser session started");
    Ok(session)
}
