//! W3C WebDriver client over `reqwest`.
//!
//! Talks to a running chromedriver or geckodriver. Only the endpoints the
//! pipelines need are wrapped; anything else is reachable through
//! [`BrowserSession::run_script`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use tracing::{debug, instrument, trace, warn};
use url::Url;

use super::{BrowserError, BrowserKind, BrowserSession};

/// Default chromedriver endpoint.
pub const DEFAULT_CHROMEDRIVER_URL: &str = "http://localhost:9515";

/// Default geckodriver endpoint.
pub const DEFAULT_GECKODRIVER_URL: &str = "http://localhost:4444";

/// Web element identifier key from W3C WebDriver.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Extra slack on top of the page-load timeout for the HTTP round trip.
const TRANSPORT_SLACK: Duration = Duration::from_secs(30);

const MATCH_TEXT_SCRIPT: &str = r"
const [selector, needles, limit] = arguments;
const out = [];
for (const el of document.querySelectorAll(selector)) {
  if (out.length >= limit) break;
  const rect = el.getBoundingClientRect();
  if (rect.width === 0 && rect.height === 0) continue;
  const text = (el.innerText || el.textContent || '').trim().toLowerCase();
  if (!text || text.length > 200) continue;
  if (!needles.some((needle) => text.includes(needle))) continue;
  if (out.some((kept) => kept.contains(el))) continue;
  out.push(el);
}
return out;
";

const FILL_FRAME_SCRIPT: &str = r"
document.body.innerHTML = '';
document.body.innerText = arguments[0];
document.body.dispatchEvent(new Event('input', { bubbles: true }));
return true;
";

/// Options for starting a session.
#[derive(Debug, Clone)]
pub struct WebDriverOptions {
    /// Driver base URL, e.g. `http://localhost:9515`.
    pub endpoint: String,
    pub kind: BrowserKind,
    pub headless: bool,
    pub page_load_timeout: Duration,
    pub script_timeout: Duration,
    /// Initial download directory.
    pub download_dir: Option<PathBuf>,
}

impl WebDriverOptions {
    #[must_use]
    pub fn new(kind: BrowserKind) -> Self {
        let endpoint = if kind.is_chromium_family() {
            DEFAULT_CHROMEDRIVER_URL
        } else {
            DEFAULT_GECKODRIVER_URL
        };
        Self {
            endpoint: endpoint.to_string(),
            kind,
            headless: false,
            page_load_timeout: Duration::from_secs(120),
            script_timeout: Duration::from_secs(60),
            download_dir: None,
        }
    }

    fn capabilities(&self) -> Value {
        let download_dir = self
            .download_dir
            .as_ref()
            .map(|dir| dir.display().to_string());

        let always_match = if self.kind.is_chromium_family() {
            let mut args = vec![
                "--disable-blink-features=AutomationControlled",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--window-size=1920,1080",
            ];
            if self.headless {
                args.push("--headless=new");
            }
            let mut prefs = json!({
                "download.prompt_for_download": false,
                "plugins.always_open_pdf_externally": true,
            });
            if let Some(dir) = &download_dir {
                prefs["download.default_directory"] = json!(dir);
            }
            json!({
                "browserName": "chrome",
                "goog:chromeOptions": { "args": args, "prefs": prefs },
            })
        } else {
            let mut args = Vec::new();
            if self.headless {
                args.push("-headless");
            }
            let mut prefs = json!({
                "browser.download.useDownloadDir": true,
                "browser.helperApps.neverAsk.saveToDisk":
                    "text/csv,application/csv,application/octet-stream,application/zip,application/json",
            });
            if let Some(dir) = &download_dir {
                prefs["browser.download.folderList"] = json!(2);
                prefs["browser.download.dir"] = json!(dir);
            }
            json!({
                "browserName": "firefox",
                "moz:firefoxOptions": { "args": args, "prefs": prefs },
            })
        };

        json!({ "capabilities": { "alwaysMatch": always_match } })
    }
}

/// A live WebDriver session.
#[derive(Debug)]
pub struct WebDriverSession {
    client: Client,
    base: Url,
    session_id: String,
    kind: BrowserKind,
    closed: bool,
}

impl WebDriverSession {
    /// Creates a session on the driver at `options.endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError`] when the endpoint is invalid, the driver is
    /// unreachable, or it refuses the capabilities.
    #[instrument(skip(options), fields(endpoint = %options.endpoint, browser = %options.kind))]
    pub async fn start(options: &WebDriverOptions) -> Result<Self, BrowserError> {
        let base = Url::parse(options.endpoint.trim_end_matches('/')).map_err(|error| {
            BrowserError::Protocol(format!("invalid driver URL '{}': {error}", options.endpoint))
        })?;
        let client = Client::builder()
            .timeout(options.page_load_timeout + TRANSPORT_SLACK)
            .build()?;

        let url = format!("{}/session", base.as_str().trim_end_matches('/'));
        let value = send(&client, Method::POST, &url, Some(options.capabilities())).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Protocol("new session response has no sessionId".into()))?
            .to_string();

        let session = Self {
            client,
            base,
            session_id,
            kind: options.kind,
            closed: false,
        };

        session
            .command(
                Method::POST,
                "timeouts",
                Some(json!({
                    "pageLoad": millis(options.page_load_timeout),
                    "script": millis(options.script_timeout),
                    "implicit": 0,
                })),
            )
            .await?;

        debug!(session = %session.session_id, "webdriver session started");
        Ok(session)
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn session_url(&self, path: &str) -> String {
        let base = self.base.as_str().trim_end_matches('/');
        if path.is_empty() {
            format!("{base}/session/{}", self.session_id)
        } else {
            format!("{base}/session/{}/{path}", self.session_id)
        }
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, BrowserError> {
        if self.closed {
            return Err(BrowserError::Protocol("session already closed".into()));
        }
        send(&self.client, method, &self.session_url(path), body).await
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<String>, BrowserError> {
        let (using, value) = locator(selector);
        let found = self
            .command(
                Method::POST,
                "elements",
                Some(json!({ "using": using, "value": value })),
            )
            .await?;
        element_ids(&found)
    }

    async fn find_first(&self, selector: &str) -> Result<String, BrowserError> {
        self.find_all(selector)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))
    }

    async fn element_text(&self, element: &str) -> Result<String, BrowserError> {
        let value = self
            .command(Method::GET, &format!("element/{element}/text"), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Native click, falling back to a script click when the element is obscured.
    async fn click_element(&self, element: &str) -> Result<(), BrowserError> {
        match self
            .command(Method::POST, &format!("element/{element}/click"), Some(json!({})))
            .await
        {
            Ok(_) => Ok(()),
            Err(BrowserError::Driver { error, .. }) if error != "no such window" => {
                trace!(element, %error, "native click refused, using script click");
                self.command(
                    Method::POST,
                    "execute/sync",
                    Some(json!({
                        "script": "arguments[0].scrollIntoView({block: 'center'}); arguments[0].click();",
                        "args": [{ ELEMENT_KEY: element }],
                    })),
                )
                .await
                .map(|_| ())
            }
            Err(other) => Err(other),
        }
    }

    async fn matching_elements(
        &self,
        selector: &str,
        needles: &[String],
        limit: usize,
    ) -> Result<Vec<String>, BrowserError> {
        if selector.starts_with("xpath=") {
            let mut matched = Vec::new();
            for element in self.find_all(selector).await? {
                if matched.len() >= limit {
                    break;
                }
                let text = self.element_text(&element).await?.to_lowercase();
                if needles.iter().any(|needle| text.contains(needle.as_str())) {
                    matched.push(element);
                }
            }
            return Ok(matched);
        }

        let found = self
            .command(
                Method::POST,
                "execute/sync",
                Some(json!({ "script": MATCH_TEXT_SCRIPT, "args": [selector, needles, limit] })),
            )
            .await?;
        element_ids(&found)
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    #[instrument(skip(self))]
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.command(Method::POST, "url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        let value = self.command(Method::GET, "url", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BrowserError::Protocol("current URL is not a string".into()))
    }

    async fn count(&mut self, selector: &str) -> Result<usize, BrowserError> {
        Ok(self.find_all(selector).await?.len())
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        let element = self.find_first(selector).await?;
        self.click_element(&element).await
    }

    async fn click_matching_text(
        &mut self,
        selector: &str,
        needles: &[String],
        limit: usize,
    ) -> Result<usize, BrowserError> {
        let needles: Vec<String> = needles
            .iter()
            .map(|needle| needle.trim().to_lowercase())
            .filter(|needle| !needle.is_empty())
            .collect();
        if needles.is_empty() || limit == 0 {
            return Ok(0);
        }

        let mut clicked = 0;
        for element in self.matching_elements(selector, &needles, limit).await? {
            match self.click_element(&element).await {
                Ok(()) => clicked += 1,
                Err(error) => trace!(%error, "skipping unclickable element"),
            }
        }
        Ok(clicked)
    }

    async fn extract_text(&mut self, selector: &str) -> Result<Vec<String>, BrowserError> {
        let mut texts = Vec::new();
        for element in self.find_all(selector).await? {
            texts.push(self.element_text(&element).await?);
        }
        Ok(texts)
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let element = self.find_first(selector).await?;
        self.command(Method::POST, &format!("element/{element}/clear"), Some(json!({})))
            .await?;
        self.command(
            Method::POST,
            &format!("element/{element}/value"),
            Some(json!({ "text": value })),
        )
        .await
        .map(|_| ())
    }

    async fn fill_frame(&mut self, frame_selector: &str, value: &str) -> Result<(), BrowserError> {
        let frame = self.find_first(frame_selector).await?;
        self.command(
            Method::POST,
            "frame",
            Some(json!({ "id": { ELEMENT_KEY: frame } })),
        )
        .await?;
        let written = self
            .command(
                Method::POST,
                "execute/sync",
                Some(json!({ "script": FILL_FRAME_SCRIPT, "args": [value] })),
            )
            .await;
        let restored = self
            .command(Method::POST, "frame/parent", Some(json!({})))
            .await;
        written?;
        restored.map(|_| ())
    }

    async fn upload(&mut self, selector: &str, path: &Path) -> Result<(), BrowserError> {
        let absolute = std::fs::canonicalize(path)?;
        let element = self.find_first(selector).await?;
        self.command(
            Method::POST,
            &format!("element/{element}/value"),
            Some(json!({ "text": absolute.display().to_string() })),
        )
        .await
        .map(|_| ())
    }

    async fn run_script(&mut self, script: &str) -> Result<Value, BrowserError> {
        self.command(
            Method::POST,
            "execute/sync",
            Some(json!({ "script": script, "args": [] })),
        )
        .await
    }

    async fn page_ready(&mut self) -> Result<bool, BrowserError> {
        let state = self.run_script("return document.readyState;").await?;
        Ok(state.as_str() == Some("complete"))
    }

    async fn set_download_dir(&mut self, dir: &Path) -> Result<(), BrowserError> {
        if !self.kind.is_chromium_family() {
            return Err(BrowserError::Unsupported(
                "changing the download directory mid-session needs a Chromium driver".into(),
            ));
        }
        let absolute = std::fs::canonicalize(dir)?;
        self.command(
            Method::POST,
            "goog/cdp/execute",
            Some(json!({
                "cmd": "Page.setDownloadBehavior",
                "params": { "behavior": "allow", "downloadPath": absolute.display().to_string() },
            })),
        )
        .await
        .map(|_| ())
    }

    async fn render_pdf(&mut self) -> Result<Vec<u8>, BrowserError> {
        let value = self
            .command(
                Method::POST,
                "print",
                Some(json!({
                    "orientation": "portrait",
                    "background": true,
                    "page": { "width": 21.0, "height": 29.7 },
                })),
            )
            .await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| BrowserError::Protocol("print response is not base64 text".into()))?;
        STANDARD
            .decode(encoded)
            .map_err(|error| BrowserError::Protocol(format!("invalid print payload: {error}")))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        if self.closed {
            return Ok(());
        }
        let result = self.command(Method::DELETE, "", None).await;
        self.closed = true;
        if let Err(error) = &result {
            warn!(%error, "failed to delete webdriver session");
        }
        result.map(|_| ())
    }
}

async fn send(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<Value, BrowserError> {
    trace!(%method, url, "webdriver request");
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await?;
    let status = response.status();
    let payload: Value = response
        .json()
        .await
        .map_err(|error| BrowserError::Protocol(format!("HTTP {status}: {error}")))?;
    let value = payload.get("value").cloned().unwrap_or(Value::Null);

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(BrowserError::Driver {
            error: error.to_string(),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }
    if !status.is_success() {
        return Err(BrowserError::Protocol(format!("HTTP {status} without error payload")));
    }
    Ok(value)
}

fn locator(selector: &str) -> (&'static str, &str) {
    match selector.strip_prefix("xpath=") {
        Some(xpath) => ("xpath", xpath),
        None => ("css selector", selector),
    }
}

fn element_ids(value: &Value) -> Result<Vec<String>, BrowserError> {
    let Some(items) = value.as_array() else {
        return Err(BrowserError::Protocol("expected an element list".into()));
    };
    items
        .iter()
        .map(|item| {
            item.get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| BrowserError::Protocol("element reference without id".into()))
        })
        .collect()
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_defaults_to_css() {
        assert_eq!(locator("#title"), ("css selector", "#title"));
        assert_eq!(
            locator("xpath=//span[text()='x']"),
            ("xpath", "//span[text()='x']")
        );
    }

    #[test]
    fn test_element_ids_reads_w3c_key() {
        let value = json!([{ ELEMENT_KEY: "a" }, { ELEMENT_KEY: "b" }]);
        assert_eq!(element_ids(&value).unwrap(), vec!["a", "b"]);
        assert!(element_ids(&json!({})).is_err());
    }

    #[test]
    fn test_chrome_capabilities_carry_headless_and_download_dir() {
        let mut options = WebDriverOptions::new(BrowserKind::Chrome);
        options.headless = true;
        options.download_dir = Some(PathBuf::from("/tmp/downloads"));
        let caps = options.capabilities();
        let chrome = &caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"];
        assert!(
            chrome["args"]
                .as_array()
                .unwrap()
                .contains(&json!("--headless=new"))
        );
        assert_eq!(chrome["prefs"]["download.default_directory"], "/tmp/downloads");
        assert_eq!(options.endpoint, DEFAULT_CHROMEDRIVER_URL);
    }

    #[test]
    fn test_firefox_capabilities_use_gecko_defaults() {
        let options = WebDriverOptions::new(BrowserKind::Firefox);
        let caps = options.capabilities();
        assert_eq!(caps["capabilities"]["alwaysMatch"]["browserName"], "firefox");
        assert_eq!(options.endpoint, DEFAULT_GECKODRIVER_URL);
    }
}
