//! Operator pause points: manual sign-in and publish confirmation.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;

use super::UploadError;

/// Blocks the run until a human answers.
#[async_trait]
pub trait Checkpoint: Send {
    /// Shows `prompt` and waits. `Ok(true)` continues, `Ok(false)` declines.
    async fn confirm(&mut self, prompt: &str) -> Result<bool, UploadError>;
}

/// Reads the answer from standard input.
///
/// An empty line or anything starting with `y` continues; `n` or `q` declines.
/// End of input declines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalCheckpoint;

#[async_trait]
impl Checkpoint for TerminalCheckpoint {
    async fn confirm(&mut self, prompt: &str) -> Result<bool, UploadError> {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || {
            let mut stderr = io::stderr().lock();
            write!(stderr, "\n{prompt}\n[Enter/y] continue, [n] skip: ")
                .and_then(|()| stderr.flush())
                .map_err(|error| UploadError::Checkpoint(error.to_string()))?;

            let mut line = String::new();
            let read = io::stdin()
                .lock()
                .read_line(&mut line)
                .map_err(|error| UploadError::Checkpoint(error.to_string()))?;
            Ok(read > 0 && parse_answer(&line))
        })
        .await
        .map_err(|error| UploadError::Checkpoint(error.to_string()))?
    }
}

fn parse_answer(line: &str) -> bool {
    let answer = line.trim().to_ascii_lowercase();
    !(answer.starts_with('n') || answer.starts_with('q'))
}

#[cfg(test)]
mod tests {
    use super::parse_answer;

    #[test]
    fn test_empty_and_yes_continue() {
        assert!(parse_answer("\n"));
        assert!(parse_answer("y\n"));
        assert!(parse_answer("Yes"));
    }

    #[test]
    fn test_no_and_quit_decline() {
        assert!(!parse_answer("n\n"));
        assert!(!parse_answer("No"));
        assert!(!parse_answer("q"));
    }
}
