//! Browser capability used by the collection and upload pipelines.
//!
//! Pipelines never talk to a driver directly; they take a
//! `&mut dyn BrowserSession` so tests can script page behavior. The shipped
//! backend is [`WebDriverSession`], a W3C WebDriver client.
//!
//! Selectors are CSS unless prefixed with `xpath=`.
//!
//! Every wait in this module is bounded: helpers poll [`BrowserSession::count`]
//! until a deadline and fail with [`BrowserError::Timeout`].

mod webdriver;

pub use webdriver::{
    DEFAULT_CHROMEDRIVER_URL, DEFAULT_GECKODRIVER_URL, WebDriverOptions, WebDriverSession,
};

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::trace;

/// Errors raised by a browser session.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// A bounded wait expired.
    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout {
        /// What was awaited.
        what: String,
        /// Bound that expired.
        timeout: Duration,
    },

    /// No element matched.
    #[error("no element matches '{0}'")]
    ElementNotFound(String),

    /// The driver answered with a WebDriver error.
    #[error("driver error {error}: {message}")]
    Driver {
        /// WebDriver error code, e.g. `no such window`.
        error: String,
        /// Driver-provided message.
        message: String,
    },

    /// The driver answered with something that is not a WebDriver payload.
    #[error("unexpected driver response: {0}")]
    Protocol(String),

    /// The backend cannot perform the request.
    #[error("unsupported by this browser: {0}")]
    Unsupported(String),

    /// Transport to the driver failed.
    #[error("driver connection failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Local filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Browser family to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BrowserKind {
    #[default]
    Chrome,
    Chromium,
    Firefox,
}

impl BrowserKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Chromium => "chromium",
            Self::Firefox => "firefox",
        }
    }

    /// Chrome and Chromium share the chromedriver protocol extensions.
    #[must_use]
    pub fn is_chromium_family(self) -> bool {
        matches!(self, Self::Chrome | Self::Chromium)
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrowserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chrome" => Ok(Self::Chrome),
            "chromium" => Ok(Self::Chromium),
            "firefox" => Ok(Self::Firefox),
            other => Err(format!("unsupported browser: {other}")),
        }
    }
}

/// Operations the pipelines need from a browser.
///
/// One session is exclusive to one invocation; methods take `&mut self`.
#[async_trait]
pub trait BrowserSession: Send {
    /// Loads `url` and returns once the driver reports navigation complete.
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&mut self) -> Result<String, BrowserError>;

    /// Number of elements currently matching `selector`.
    async fn count(&mut self, selector: &str) -> Result<usize, BrowserError>;

    /// Clicks the first element matching `selector`.
    async fn click(&mut self, selector: &str) -> Result<(), BrowserError>;

    /// Clicks up to `limit` displayed elements under `selector` whose text
    /// contains any of `needles` (case-insensitive). Returns how many were clicked.
    async fn click_matching_text(
        &mut self,
        selector: &str,
        needles: &[String],
        limit: usize,
    ) -> Result<usize, BrowserError>;

    /// Visible text of every element matching `selector`, in document order.
    async fn extract_text(&mut self, selector: &str) -> Result<Vec<String>, BrowserError>;

    /// Clears the first matching input and types `value`.
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError>;

    /// Replaces the body text of the rich-text editor inside the matching iframe.
    async fn fill_frame(&mut self, frame_selector: &str, value: &str)
    -> Result<(), BrowserError>;

    /// Sends a local file path to a file input.
    async fn upload(&mut self, selector: &str, path: &Path) -> Result<(), BrowserError>;

    /// Runs a synchronous script and returns its JSON result.
    async fn run_script(&mut self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// True once the document reports `readyState == "complete"`.
    async fn page_ready(&mut self) -> Result<bool, BrowserError>;

    /// Directs subsequent downloads into `dir`.
    async fn set_download_dir(&mut self, dir: &Path) -> Result<(), BrowserError>;

    /// Renders the current page to PDF bytes.
    async fn render_pdf(&mut self) -> Result<Vec<u8>, BrowserError>;

    /// Ends the session. Further calls fail.
    async fn close(&mut self) -> Result<(), BrowserError>;
}

/// Polls until at least one element matches `selector`.
///
/// # Errors
///
/// Returns [`BrowserError::Timeout`] when nothing matches before `timeout`,
/// or the session's own error.
pub async fn wait_for(
    session: &mut dyn BrowserSession,
    selector: &str,
    timeout: Duration,
    poll: Duration,
) -> Result<(), BrowserError> {
    wait_for_count(session, selector, 1, timeout, poll).await
}

/// Polls until at least `expected` elements match `selector`.
///
/// # Errors
///
/// Returns [`BrowserError::Timeout`] when the count stays short.
pub async fn wait_for_count(
    session: &mut dyn BrowserSession,
    selector: &str,
    expected: usize,
    timeout: Duration,
    poll: Duration,
) -> Result<(), BrowserError> {
    let deadline = Instant::now() + timeout;
    loop {
        let found = session.count(selector).await?;
        if found >= expected {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(BrowserError::Timeout {
                what: format!("{expected} x '{selector}' (saw {found})"),
                timeout,
            });
        }
        trace!(selector, found, expected, "waiting for elements");
        tokio::time::sleep(poll).await;
    }
}

/// Polls until no element matches `selector`.
///
/// # Errors
///
/// Returns [`BrowserError::Timeout`] when the element is still present at the deadline.
pub async fn wait_gone(
    session: &mut dyn BrowserSession,
    selector: &str,
    timeout: Duration,
    poll: Duration,
) -> Result<(), BrowserError> {
    let deadline = Instant::now() + timeout;
    loop {
        if session.count(selector).await? == 0 {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(BrowserError::Timeout {
                what: format!("'{selector}' to disappear"),
                timeout,
            });
        }
        tokio::time::sleep(poll).await;
    }
}

/// Polls until the document reports ready.
///
/// # Errors
///
/// Returns [`BrowserError::Timeout`] when the page never settles.
pub async fn wait_ready(
    session: &mut dyn BrowserSession,
    timeout: Duration,
    poll: Duration,
) -> Result<(), BrowserError> {
    let deadline = Instant::now() + timeout;
    loop {
        if session.page_ready().await? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(BrowserError::Timeout {
                what: "document ready state".to_string(),
                timeout,
            });
        }
        tokio::time::sleep(poll).await;
    }
}
