//! `rescue audit`: report artifact folders with missing files.

use std::fs::File;
use std::io::{self, BufWriter};

use anyhow::{Context, Result};
use rescue_core::audit;
use tracing::info;

use crate::ProcessExit;
use crate::cli::AuditArgs;

pub(crate) fn run(args: &AuditArgs) -> Result<ProcessExit> {
    let report = audit(&args.base, &args.csv, args.expected_files)?;

    match &args.report {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            report
                .write_tsv(BufWriter::new(file))
                .with_context(|| format!("writing {}", path.display()))?;
            info!(report = %path.display(), "report written");
        }
        None => report.write_tsv(io::stdout().lock())?,
    }

    info!(
        scanned = report.scanned,
        issues = report.findings.len(),
        "folders with other than {} files: {}",
        args.expected_files,
        report.findings.len()
    );
    Ok(ProcessExit::Success)
}
