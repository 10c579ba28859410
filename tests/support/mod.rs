//! Shared fixtures for integration tests: a scripted browser and an
//! operator checkpoint that answers without a terminal.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rescue_core::{BrowserError, BrowserSession, Checkpoint, UploadError};

/// Deterministic in-memory browser.
///
/// Selectors in `present` match one element. Texts and exported files are
/// scripted per URL. Every mutating call is logged so tests can assert that
/// nothing happened.
#[derive(Debug, Default)]
pub struct FakeBrowser {
    pub url: String,
    pub present: HashSet<String>,
    /// URL -> selector -> texts returned by `extract_text`.
    pub texts: HashMap<String, HashMap<String, Vec<String>>>,
    /// URL -> file names written into the download dir when `export_selector` is clicked.
    pub exports: HashMap<String, Vec<String>>,
    pub export_selector: String,
    /// Counts one element per uploaded file.
    pub ack_selector: Option<String>,
    /// Reported by `current_url` once set, regardless of navigation.
    pub location_override: Option<String>,
    pub failing_urls: HashSet<String>,
    pub download_dir: Option<PathBuf>,

    pub navigations: Vec<String>,
    pub clicks: Vec<String>,
    pub fills: Vec<(String, String)>,
    pub uploads: Vec<PathBuf>,
    pub closed: bool,
}

impl FakeBrowser {
    pub fn with_present(selectors: &[&str]) -> Self {
        Self {
            present: selectors.iter().map(|s| (*s).to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn set_texts(&mut self, url: &str, selector: &str, texts: &[&str]) {
        self.texts
            .entry(url.to_string())
            .or_default()
            .insert(
                selector.to_string(),
                texts.iter().map(|t| (*t).to_string()).collect(),
            );
    }

    pub fn set_exports(&mut self, url: &str, files: &[&str]) {
        self.exports.insert(
            url.to_string(),
            files.iter().map(|f| (*f).to_string()).collect(),
        );
    }

    /// Number of browser calls that change page state.
    pub fn mutations(&self) -> usize {
        self.navigations.len() + self.clicks.len() + self.fills.len() + self.uploads.len()
    }

    fn missing(selector: &str) -> BrowserError {
        BrowserError::ElementNotFound(selector.to_string())
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.navigations.push(url.to_string());
        if self.failing_urls.contains(url) {
            return Err(BrowserError::Driver {
                error: "unknown error".to_string(),
                message: format!("net::ERR_NAME_NOT_RESOLVED at {url}"),
            });
        }
        self.url = url.to_string();
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        Ok(self
            .location_override
            .clone()
            .unwrap_or_else(|| self.url.clone()))
    }

    async fn count(&mut self, selector: &str) -> Result<usize, BrowserError> {
        if self.ack_selector.as_deref() == Some(selector) {
            return Ok(self.uploads.len());
        }
        Ok(usize::from(self.present.contains(selector)))
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        if !self.present.contains(selector) {
            return Err(Self::missing(selector));
        }
        self.clicks.push(selector.to_string());
        if selector == self.export_selector
            && let (Some(dir), Some(files)) = (&self.download_dir, self.exports.get(&self.url))
        {
            for name in files {
                std::fs::write(dir.join(name), b"a,b\n1,2\n")?;
            }
        }
        Ok(())
    }

    async fn click_matching_text(
        &mut self,
        selector: &str,
        needles: &[String],
        limit: usize,
    ) -> Result<usize, BrowserError> {
        if !self.present.contains(selector) || limit == 0 {
            return Ok(0);
        }
        self.clicks
            .push(format!("{selector} ~ {}", needles.join("|")));
        Ok(1)
    }

    async fn extract_text(&mut self, selector: &str) -> Result<Vec<String>, BrowserError> {
        Ok(self
            .texts
            .get(&self.url)
            .and_then(|by_selector| by_selector.get(selector))
            .cloned()
            .unwrap_or_default())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        if !self.present.contains(selector) {
            return Err(Self::missing(selector));
        }
        self.fills.push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn fill_frame(&mut self, frame_selector: &str, value: &str) -> Result<(), BrowserError> {
        self.fill(frame_selector, value).await
    }

    async fn upload(&mut self, selector: &str, path: &Path) -> Result<(), BrowserError> {
        if !self.present.contains(selector) {
            return Err(Self::missing(selector));
        }
        self.uploads.push(path.to_path_buf());
        Ok(())
    }

    async fn run_script(&mut self, _script: &str) -> Result<serde_json::Value, BrowserError> {
        Ok(serde_json::Value::Null)
    }

    async fn page_ready(&mut self) -> Result<bool, BrowserError> {
        Ok(true)
    }

    async fn set_download_dir(&mut self, dir: &Path) -> Result<(), BrowserError> {
        self.download_dir = Some(dir.to_path_buf());
        Ok(())
    }

    async fn render_pdf(&mut self) -> Result<Vec<u8>, BrowserError> {
        Ok(b"%PDF-1.4\n%fake\n".to_vec())
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.closed = true;
        Ok(())
    }
}

/// Answers checkpoints from a script, then with `fallback`.
#[derive(Debug, Clone)]
pub struct ScriptedCheckpoint {
    answers: Arc<Mutex<VecDeque<bool>>>,
    fallback: bool,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedCheckpoint {
    pub fn always(answer: bool) -> Self {
        Self::answers(&[], answer)
    }

    pub fn answers(answers: &[bool], fallback: bool) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers.iter().copied().collect())),
            fallback,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Prompts seen so far; shared with clones handed to a pipeline.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log poisoned").clone()
    }
}

#[async_trait]
impl Checkpoint for ScriptedCheckpoint {
    async fn confirm(&mut self, prompt: &str) -> Result<bool, UploadError> {
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .push(prompt.to_string());
        let next = self.answers.lock().expect("answers poisoned").pop_front();
        Ok(next.unwrap_or(self.fallback))
    }
}
