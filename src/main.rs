//! CLI entry point for the rescue tool.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

mod app;
mod cli;

use app::{exit_handler, runtime, terminal};
use cli::Args;

/// Process outcome, mapped to the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every selected row was processed, whatever its outcome.
    Success,
    /// Rejected before any row started.
    Configuration,
    /// Stopped by a fatal error.
    Failure,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Configuration => 2,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let force_cli_level = args.quiet || args.verbose > 0;
    terminal::init_tracing(
        terminal::default_log_level(args.verbose, args.quiet),
        force_cli_level,
        terminal::no_color_env_requested() || terminal::is_dumb_terminal(),
    );

    let exit = match runtime::run(args).await {
        Ok(exit) => exit,
        Err(err) => {
            error!("{err:#}");
            exit_handler::classify_error(&err)
        }
    };
    ExitCode::from(exit.code())
}
