//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use rescue_core::{BrowserKind, PublishMode};

/// Rescue government datasets into an archival workspace.
///
/// `collect` harvests landing-page metadata, a PDF snapshot and the exported
/// files of each eligible source row. `upload` republishes collected rows
/// into the archival workspace. `audit` finds row folders with missing files.
#[derive(Parser, Debug)]
#[command(name = "rescue")]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to $XDG_CONFIG_HOME/rescue/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the progress ledger
    #[arg(long, global = true, default_value = ".rescue", value_name = "DIR")]
    pub state_dir: PathBuf,

    /// WebDriver endpoint (defaults to the local driver for the chosen browser)
    #[arg(long, global = true, value_name = "URL")]
    pub webdriver_url: Option<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Harvest metadata, snapshot and files for eligible source rows
    Collect(CollectArgs),
    /// Publish collected rows into the archival workspace
    Upload(UploadArgs),
    /// Report artifact folders with an unexpected number of files
    Audit(AuditArgs),
}

#[derive(ClapArgs, Debug)]
pub struct CollectArgs {
    /// Source CSV with a header row
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    /// First eligible row to process (0-based, counted among eligible rows)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub start_row: i64,

    /// Number of eligible rows to process (default: all remaining)
    #[arg(long)]
    pub num_rows: Option<usize>,

    /// Intermediate CSV to append results to; results are always written to a file
    #[arg(long, default_value = "collected.csv", value_name = "PATH")]
    pub output: PathBuf,

    /// Directory receiving one folder per row
    #[arg(long, default_value = "collected", value_name = "DIR")]
    pub artifacts: PathBuf,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,

    /// Browser to drive
    #[arg(long, value_enum, default_value_t = BrowserKind::Chrome)]
    pub browser: BrowserKind,

    /// Skip rows whose latest recorded outcome is ok
    #[arg(long)]
    pub skip_succeeded: bool,
}

#[derive(ClapArgs, Debug)]
pub struct UploadArgs {
    /// Intermediate CSV produced by `collect`
    #[arg(long, value_name = "PATH")]
    pub csv: PathBuf,

    /// First data row to upload (1-indexed, header excluded)
    #[arg(long)]
    pub start_row: usize,

    /// Last data row to upload (inclusive)
    #[arg(long)]
    pub end_row: usize,

    /// Base folder the CSV `path` column is relative to
    #[arg(long, value_name = "PATH")]
    pub folder: Option<PathBuf>,

    /// Workspace account for automated sign-in
    #[arg(long)]
    pub username: Option<String>,

    /// Workspace password
    #[arg(long, env = "RESCUE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Browser to drive
    #[arg(long, value_enum, default_value_t = BrowserKind::Chrome)]
    pub browser: BrowserKind,

    /// Which publish transitions to perform
    #[arg(long, value_enum, default_value_t = PublishMode::Default)]
    pub publish_mode: PublishMode,

    /// Archive nomination form URL (overrides the configured one)
    #[arg(long, value_name = "URL")]
    pub nomination_url: Option<String>,

    /// Name sent with archive nominations
    #[arg(long)]
    pub nominator_name: Option<String>,

    /// Email sent with archive nominations
    #[arg(long)]
    pub nominator_email: Option<String>,

    /// Sheet of record to write published URLs back to
    #[arg(long, value_name = "PATH", requires = "sheet_credentials")]
    pub reconcile_sheet: Option<PathBuf>,

    /// Service identity JSON used to claim sheet rows
    #[arg(long, value_name = "PATH")]
    pub sheet_credentials: Option<PathBuf>,

    /// Claim-owner label (defaults to the service identity's email)
    #[arg(long)]
    pub claim_owner: Option<String>,

    /// Skip rows whose latest recorded outcome is ok
    #[arg(long)]
    pub skip_succeeded: bool,
}

#[derive(ClapArgs, Debug)]
pub struct AuditArgs {
    /// Folder containing one subfolder per collected row
    #[arg(long, value_name = "DIR")]
    pub base: PathBuf,

    /// Intermediate CSV with `path` and source URL columns
    #[arg(long, value_name = "PATH")]
    pub csv: PathBuf,

    /// Files each complete folder should hold
    #[arg(long, default_value_t = 2)]
    pub expected_files: usize,

    /// Write the report here instead of standard output
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn collect(args: &Args) -> &CollectArgs {
        match &args.command {
            Command::Collect(collect) => collect,
            other => panic!("expected collect, got {other:?}"),
        }
    }

    fn upload(args: &Args) -> &UploadArgs {
        match &args.command {
            Command::Upload(upload) => upload,
            other => panic!("expected upload, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_collect_defaults() {
        let args = Args::try_parse_from(["rescue", "collect", "--input", "sites.csv"]).unwrap();
        let collect = collect(&args);
        assert_eq!(collect.input, PathBuf::from("sites.csv"));
        assert_eq!(collect.start_row, 0);
        assert_eq!(collect.num_rows, None);
        assert_eq!(collect.artifacts, PathBuf::from("collected"));
        assert!(!collect.headless);
        assert!(!collect.skip_succeeded);
        assert_eq!(args.state_dir, PathBuf::from(".rescue"));
    }

    #[test]
    fn test_cli_collect_accepts_negative_start_row() {
        let args = Args::try_parse_from([
            "rescue", "collect", "--input", "s.csv", "--start-row", "-1",
        ])
        .unwrap();
        assert_eq!(collect(&args).start_row, -1);
    }

    #[test]
    fn test_cli_upload_requires_row_window() {
        let result = Args::try_parse_from(["rescue", "upload", "--csv", "c.csv"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_upload_parses_modes_and_browser() {
        let args = Args::try_parse_from([
            "rescue",
            "upload",
            "--csv",
            "c.csv",
            "--start-row",
            "2",
            "--end-row",
            "4",
            "--publish-mode",
            "only-publish",
            "--browser",
            "firefox",
        ])
        .unwrap();
        let upload = upload(&args);
        assert_eq!(upload.start_row, 2);
        assert_eq!(upload.end_row, 4);
        assert_eq!(upload.publish_mode, PublishMode::OnlyPublish);
        assert_eq!(upload.browser, BrowserKind::Firefox);
    }

    #[test]
    fn test_cli_upload_rejects_unknown_mode() {
        let result = Args::try_parse_from([
            "rescue", "upload", "--csv", "c.csv", "--start-row", "1", "--end-row", "1",
            "--publish-mode", "later",
        ]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::InvalidValue
        );
    }

    #[test]
    fn test_cli_reconcile_sheet_requires_credentials() {
        let result = Args::try_parse_from([
            "rescue", "upload", "--csv", "c.csv", "--start-row", "1", "--end-row", "1",
            "--reconcile-sheet", "sheet.csv",
        ]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "rescue", "audit", "--base", "collected", "--csv", "out.csv", "-vv", "--state-dir",
            "/tmp/s",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.state_dir, PathBuf::from("/tmp/s"));
        match args.command {
            Command::Audit(audit) => assert_eq!(audit.expected_files, 2),
            other => panic!("expected audit, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_missing_subcommand_is_error() {
        assert!(Args::try_parse_from(["rescue"]).is_err());
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let result = Args::try_parse_from(["rescue", "--version"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::DisplayVersion
        );
    }
}
