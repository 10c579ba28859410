//! Executes configured [`FormStep`] sequences against a browser session.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::trace;

use crate::browser::{BrowserError, BrowserSession, wait_for, wait_gone};
use crate::config::{DestinationField, FormStep};

/// Values substituted into step templates.
#[derive(Debug, Clone, Default)]
pub struct StepContext {
    /// Replaces `{value}`.
    pub value: String,
    /// Replaces `{<field>}` with the field's first value.
    pub fields: BTreeMap<DestinationField, String>,
}

impl StepContext {
    #[must_use]
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Expands `{value}` and `{<field>}` placeholders in `template`.
    ///
    /// Substituted text is never scanned again, so values containing braces
    /// are written verbatim. Unknown placeholders are left as they are.
    #[must_use]
    pub fn expand(&self, template: &str) -> String {
        let mut expanded = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            expanded.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                rest = &rest[open..];
                break;
            };
            let name = &after[..close];
            match self.lookup(name) {
                Some(value) => expanded.push_str(value),
                None => {
                    expanded.push('{');
                    expanded.push_str(name);
                    expanded.push('}');
                }
            }
            rest = &after[close + 1..];
        }
        expanded.push_str(rest);
        expanded
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        if name == "value" {
            return Some(&self.value);
        }
        let field: DestinationField = name.parse().ok()?;
        Some(self.fields.get(&field).map_or("", String::as_str))
    }
}

/// Timing shared by every step.
#[derive(Debug, Clone)]
pub struct StepRunner {
    pub step_timeout: Duration,
    pub poll: Duration,
    /// Busy overlay awaited before each click.
    pub overlay: Option<(String, Duration)>,
}

impl StepRunner {
    /// Runs `steps` in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the failing step's [`BrowserError`].
    pub async fn run(
        &self,
        browser: &mut dyn BrowserSession,
        steps: &[FormStep],
        context: &StepContext,
    ) -> Result<(), BrowserError> {
        for step in steps {
            trace!(?step, "form step");
            self.run_step(browser, step, context).await?;
        }
        Ok(())
    }

    async fn run_step(
        &self,
        browser: &mut dyn BrowserSession,
        step: &FormStep,
        context: &StepContext,
    ) -> Result<(), BrowserError> {
        match step {
            FormStep::Click(selector) => {
                self.settle_overlay(browser).await?;
                wait_for(browser, selector, self.step_timeout, self.poll).await?;
                browser.click(selector).await
            }
            FormStep::ClickText { selector, text } => {
                self.settle_overlay(browser).await?;
                self.click_text(browser, selector, &context.expand(text)).await
            }
            FormStep::Fill(selector) => {
                wait_for(browser, selector, self.step_timeout, self.poll).await?;
                browser.fill(selector, &context.value).await
            }
            FormStep::FillWith { selector, text } => {
                wait_for(browser, selector, self.step_timeout, self.poll).await?;
                browser.fill(selector, &context.expand(text)).await
            }
            FormStep::FillFrame(selector) => {
                wait_for(browser, selector, self.step_timeout, self.poll).await?;
                browser.fill_frame(selector, &context.value).await
            }
            FormStep::WaitFor(selector) => {
                wait_for(browser, selector, self.step_timeout, self.poll).await
            }
        }
    }

    async fn click_text(
        &self,
        browser: &mut dyn BrowserSession,
        selector: &str,
        text: &str,
    ) -> Result<(), BrowserError> {
        let needles = [text.to_string()];
        let deadline = Instant::now() + self.step_timeout;
        loop {
            if browser.click_matching_text(selector, &needles, 1).await? > 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::ElementNotFound(format!(
                    "{selector} with text '{text}'"
                )));
            }
            sleep(self.poll).await;
        }
    }

    /// Waits for the busy overlay, if configured, to clear.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Timeout`] when the overlay stays up.
    pub async fn settle_overlay(
        &self,
        browser: &mut dyn BrowserSession,
    ) -> Result<(), BrowserError> {
        match &self.overlay {
            Some((selector, timeout)) => wait_gone(browser, selector, *timeout, self.poll).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_replaces_value_and_fields() {
        let mut context = StepContext::with_value("covid");
        context
            .fields
            .insert(DestinationField::TimeStart, "2020-01".to_string());
        assert_eq!(context.expand("{value}!"), "covid!");
        assert_eq!(
            context.expand("{time_start} to {time_end}"),
            "2020-01 to "
        );
        assert_eq!(context.expand("plain"), "plain");
    }

    #[test]
    fn test_expand_does_not_rescan_substituted_values() {
        let mut context = StepContext::with_value("range {time_start}");
        context
            .fields
            .insert(DestinationField::TimeStart, "2020-01".to_string());
        assert_eq!(
            context.expand("{value} / {time_start}"),
            "range {time_start} / 2020-01"
        );
        assert_eq!(context.expand("{unknown} {value"), "{unknown} {value");
    }
}
