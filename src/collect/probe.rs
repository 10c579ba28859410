//! HTTP reachability check run before a page is opened in the browser.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::debug;

use super::CollectError;
use crate::user_agent::default_probe_user_agent;

/// Issues a GET and accepts only HTTP 200.
#[derive(Debug, Clone)]
pub struct Probe {
    client: Client,
}

impl Probe {
    /// Builds a probe with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Probe`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, CollectError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(default_probe_user_agent())
            .build()
            .map_err(|error| CollectError::Probe(format!("client setup failed: {error}")))?;
        Ok(Self { client })
    }

    /// Checks that `url` answers 200.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Probe`] carrying the status or transport failure.
    pub async fn check(&self, url: &str) -> Result<(), CollectError> {
        let response = self.client.get(url).send().await.map_err(|error| {
            let reason = if error.is_timeout() {
                "timed out".to_string()
            } else if error.is_connect() {
                format!("connection failed: {error}")
            } else {
                error.to_string()
            };
            CollectError::Probe(reason)
        })?;

        let status = response.status();
        debug!(url, %status, "probe answered");
        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(CollectError::Probe(format!("HTTP {}", status.as_u16())))
        }
    }
}
