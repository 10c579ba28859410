//! Progress bar over the selected rows.

use std::io::{self, IsTerminal};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::app::terminal;

/// Builds a row progress bar when stderr is an interactive terminal and the
/// run is not quiet.
pub(crate) fn row_progress(total: usize, quiet: bool) -> Option<ProgressBar> {
    let enabled = terminal::should_use_progress_bar(
        io::stderr().is_terminal(),
        quiet,
        terminal::is_dumb_terminal(),
    );
    if !enabled || total == 0 {
        return None;
    }

    let bar = ProgressBar::new(u64::try_from(total).unwrap_or(u64::MAX));
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{pos}/{len}] {bar:30} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    Some(bar)
}
