//! Run configuration: source column layout, page selectors, destination form
//! description and the destination-field to CSV-column map.
//!
//! Every section has defaults matching the source site and destination
//! workspace the tool was built for, so an absent or empty config file is
//! valid. A TOML file only needs to carry the keys it overrides.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the settings schema.
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        /// Path that failed.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value parsed but violates a constraint.
    #[error("invalid config value for `{key}`: {reason}")]
    Invalid {
        /// Dotted key of the offending value.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// A destination workspace field that can be populated from the intermediate CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationField {
    PreTitle,
    Title,
    Agency,
    Summary,
    OriginalUrl,
    Keywords,
    GeographicCoverage,
    TimeStart,
    TimeEnd,
    DataType,
    CollectionNotes,
    DownloadDate,
    Folder,
}

impl DestinationField {
    /// All fields, in form order.
    pub const ALL: [Self; 13] = [
        Self::PreTitle,
        Self::Title,
        Self::Agency,
        Self::Summary,
        Self::OriginalUrl,
        Self::Keywords,
        Self::GeographicCoverage,
        Self::TimeStart,
        Self::TimeEnd,
        Self::DataType,
        Self::CollectionNotes,
        Self::DownloadDate,
        Self::Folder,
    ];

    /// Stable snake_case name used in config files and step templates.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreTitle => "pre_title",
            Self::Title => "title",
            Self::Agency => "agency",
            Self::Summary => "summary",
            Self::OriginalUrl => "original_url",
            Self::Keywords => "keywords",
            Self::GeographicCoverage => "geographic_coverage",
            Self::TimeStart => "time_start",
            Self::TimeEnd => "time_end",
            Self::DataType => "data_type",
            Self::CollectionNotes => "collection_notes",
            Self::DownloadDate => "download_date",
            Self::Folder => "folder",
        }
    }
}

impl fmt::Display for DestinationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("unknown destination field: {s}"))
    }
}

/// One browser interaction inside a configured flow.
///
/// `{value}` in a text or fill template is replaced by the value being
/// written; `{<field>}` by the first value of that destination field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStep {
    /// Wait for the element, then click it.
    Click(String),
    /// Click the first visible element under `selector` whose text contains `text`.
    ClickText { selector: String, text: String },
    /// Type the current value into the element.
    Fill(String),
    /// Type a template into the element.
    FillWith { selector: String, text: String },
    /// Replace the body text of a rich-text editor hosted in an iframe.
    FillFrame(String),
    /// Wait for the element to be present.
    WaitFor(String),
}

/// Steps that write one destination field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FormEntry {
    /// Field whose values drive the entry; steps run once per value.
    pub field: DestinationField,
    /// Additional fields whose presence also triggers the entry.
    #[serde(default)]
    pub with: Vec<DestinationField>,
    /// Failures are logged and the job continues.
    #[serde(default)]
    pub optional: bool,
    /// Browser steps.
    pub steps: Vec<FormStep>,
}

/// Tabular source layout and eligibility rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Zero-based column position of the claim-owner cell (column B).
    pub claim_owner_column: usize,
    /// Zero-based column position of the source URL cell (column G).
    pub source_url_column: usize,
    /// Zero-based column position of the download-location cell (column L).
    pub download_location_column: usize,
    /// Required source URL prefix.
    pub host_prefix: String,
    /// Header names tried for the dataset title.
    pub title_headers: Vec<String>,
    /// Header names tried for the publishing office.
    pub office_headers: Vec<String>,
    /// Header names tried for the agency.
    pub agency_headers: Vec<String>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            claim_owner_column: 1,
            source_url_column: 6,
            download_location_column: 11,
            host_prefix: "https://data.cdc.gov".to_string(),
            title_headers: strings(&["Title of Site", "Title", "Site Title"]),
            office_headers: strings(&["Office"]),
            agency_headers: strings(&["Agency"]),
        }
    }
}

/// Collection phase timing and page structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectSettings {
    /// Check the source URL answers HTTP 200 before opening it in the browser.
    pub probe: bool,
    pub probe_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    /// Pause after navigation and after expanding content.
    pub settle_ms: u64,
    pub render_timeout_ms: u64,
    pub export_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Visible texts of controls that reveal truncated content.
    pub expand_keywords: Vec<String>,
    pub expand_selector: String,
    pub expand_limit: usize,
    /// Candidate selectors, first non-blank match wins.
    pub title_selectors: Vec<String>,
    pub summary_selectors: Vec<String>,
    pub keyword_selectors: Vec<String>,
    /// Page size forced on paginated tables before rendering.
    pub page_size: u32,
    /// Script forcing the page size; `{page_size}` is substituted.
    pub page_size_script: String,
    /// Script returning the table's total row count or null.
    pub total_rows_script: String,
    /// Loading indicator that must disappear before rendering.
    pub busy_selector: Option<String>,
    /// Export controls clicked in order when present.
    pub export_selectors: Vec<String>,
    /// Number of exported files that completes the export stage.
    pub expected_exports: usize,
}

impl Default for CollectSettings {
    fn default() -> Self {
        Self {
            probe: true,
            probe_timeout_ms: 30_000,
            navigation_timeout_ms: 120_000,
            settle_ms: 2_000,
            render_timeout_ms: 60_000,
            export_timeout_ms: 180_000,
            poll_interval_ms: 250,
            expand_keywords: strings(&[
                "read more",
                "show more",
                "expand",
                "see more",
                "view more",
                "read full",
                "show full",
                "view full",
                "continue reading",
            ]),
            expand_selector: r#"a, button, [role="button"], span, div"#.to_string(),
            expand_limit: 50,
            title_selectors: strings(&["h1.dataset-name", "h1", ".asset-name"]),
            summary_selectors: strings(&[
                ".description-section .description",
                "[itemprop=\"description\"]",
                ".dataset-description",
                ".description",
            ]),
            keyword_selectors: strings(&[".tag-list .tag", ".tags a", "[data-testid=\"tag\"]"]),
            page_size: 100,
            page_size_script: DEFAULT_PAGE_SIZE_SCRIPT.to_string(),
            total_rows_script: DEFAULT_TOTAL_ROWS_SCRIPT.to_string(),
            busy_selector: None,
            export_selectors: strings(&[
                "forge-button[data-testid=\"export-data-button\"]",
                "a[href*=\"rows.csv\"]",
            ]),
            expected_exports: 1,
        }
    }
}

const DEFAULT_PAGE_SIZE_SCRIPT: &str = r"
const fp = document.querySelector('forge-paginator');
if (!fp) { return { applied: false, message: 'paginator not found' }; }
fp.pageSize = {page_size};
fp.setAttribute('page-size', '{page_size}');
const fs = fp.shadowRoot && fp.shadowRoot.querySelector('forge-select');
if (fs) { fs.value = '{page_size}'; }
return { applied: true, message: 'page size set' };
";

const DEFAULT_TOTAL_ROWS_SCRIPT: &str = r"
const fp = document.querySelector('forge-paginator');
if (!fp || !fp.shadowRoot) { return null; }
const label = fp.shadowRoot.querySelector('.range-label');
if (!label) { return null; }
const match = (label.textContent || '').match(/of\s+(\d+)/i);
return match ? parseInt(match[1], 10) : null;
";

/// Automated sign-in flow.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignInSettings {
    pub open_steps: Vec<FormStep>,
    pub username_selector: String,
    pub password_selector: String,
    pub submit_steps: Vec<FormStep>,
}

impl Default for SignInSettings {
    fn default() -> Self {
        let buttons = r#"button, a, [role="button"]"#;
        Self {
            open_steps: vec![
                FormStep::ClickText {
                    selector: buttons.to_string(),
                    text: "Login".to_string(),
                },
                FormStep::ClickText {
                    selector: buttons.to_string(),
                    text: "Sign in with Email".to_string(),
                },
            ],
            username_selector: r#"input#username, input[name="username"]"#.to_string(),
            password_selector: r#"input#password, input[name="password"]"#.to_string(),
            submit_steps: vec![FormStep::Click(
                r#"input[type="submit"][value="Sign In"]"#.to_string(),
            )],
        }
    }
}

/// File upload dialog of a destination project.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadDialogSettings {
    pub open_steps: Vec<FormStep>,
    pub file_input: String,
    /// Element that appears once per acknowledged file.
    pub ack_selector: String,
    pub ack_timeout_ms: u64,
    pub close_steps: Vec<FormStep>,
}

impl Default for UploadDialogSettings {
    fn default() -> Self {
        Self {
            open_steps: vec![FormStep::Click(
                "a.btn-primary:nth-child(3) > span:nth-child(4)".to_string(),
            )],
            file_input: r#"input[type="file"]"#.to_string(),
            ack_selector: "xpath=//span[text()='File added to queue for upload.']".to_string(),
            ack_timeout_ms: 2_000_000,
            close_steps: vec![FormStep::Click(
                ".importFileModal > div:nth-child(3) > button:nth-child(1)".to_string(),
            )],
        }
    }
}

/// External archive nomination form.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NominationSettings {
    /// Form URL; nomination is skipped when unset.
    pub url: Option<String>,
    pub url_selector: String,
    pub name_selector: Option<String>,
    pub email_selector: Option<String>,
    pub submit_steps: Vec<FormStep>,
    /// Element confirming the submission.
    pub ack_selector: Option<String>,
    pub timeout_ms: u64,
}

impl Default for NominationSettings {
    fn default() -> Self {
        Self {
            url: None,
            url_selector: r#"input[name="url"]"#.to_string(),
            name_selector: Some(r#"input[name="name"]"#.to_string()),
            email_selector: Some(r#"input[name="email"]"#.to_string()),
            submit_steps: vec![FormStep::Click(r#"button[type="submit"]"#.to_string())],
            ack_selector: None,
            timeout_ms: 30_000,
        }
    }
}

/// Destination workspace layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub home_url: String,
    pub workspace_url: String,
    pub step_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Human-verification interstitial that must clear before continuing.
    pub verification_selector: String,
    pub verification_timeout_ms: u64,
    /// Busy overlay that must clear before each click.
    pub overlay_selector: Option<String>,
    pub overlay_timeout_ms: u64,
    pub sign_in: SignInSettings,
    /// Steps that create a project; `{value}` is the composed title.
    pub create_project: Vec<FormStep>,
    /// Regex with one capture group extracting the project id from the URL.
    pub project_id_pattern: String,
    pub form: Vec<FormEntry>,
    pub upload_dialog: UploadDialogSettings,
    pub publish_steps: Vec<FormStep>,
    pub nomination: NominationSettings,
    /// Workspace page of an existing project, opened before publishing.
    pub project_url_template: String,
    /// Reference URL of a published project; `{project_id}` is substituted.
    pub published_url_template: String,
}

impl Default for UploadSettings {
    fn default() -> Self {
        let expand = "#expand-init > span:nth-child(2)".to_string();
        Self {
            home_url: "https://www.icpsr.umich.edu/sites/datalumos/home".to_string(),
            workspace_url: "https://www.datalumos.org/datalumos/workspace".to_string(),
            step_timeout_ms: 100_000,
            poll_interval_ms: 250,
            verification_selector: r#"[class*="verifying"], [id*="verifying"]"#.to_string(),
            verification_timeout_ms: 30_000,
            overlay_selector: Some("#busy".to_string()),
            overlay_timeout_ms: 360_000,
            sign_in: SignInSettings::default(),
            create_project: vec![
                FormStep::Click(".btn > span:nth-child(3)".to_string()),
                FormStep::Fill("#title".to_string()),
                FormStep::Click(".save-project".to_string()),
                FormStep::ClickText {
                    selector: "a".to_string(),
                    text: "Continue To Project Workspace".to_string(),
                },
                FormStep::Click(expand.clone()),
                FormStep::Click(expand),
            ],
            project_id_pattern: r"/datalumos/(\d+)".to_string(),
            form: default_form(),
            upload_dialog: UploadDialogSettings::default(),
            publish_steps: vec![
                FormStep::ClickText {
                    selector: "button, a".to_string(),
                    text: "Publish Project".to_string(),
                },
                FormStep::ClickText {
                    selector: ".modal button".to_string(),
                    text: "Publish".to_string(),
                },
            ],
            nomination: NominationSettings::default(),
            project_url_template: "https://www.datalumos.org/datalumos/{project_id}".to_string(),
            published_url_template:
                "https://www.datalumos.org/datalumos/project/{project_id}/version/V1/view"
                    .to_string(),
        }
    }
}

fn default_form() -> Vec<FormEntry> {
    let entry = |field, optional, steps| FormEntry {
        field,
        with: Vec::new(),
        optional,
        steps,
    };
    let inline_edit = |edit: &str| {
        vec![
            FormStep::Click(edit.to_string()),
            FormStep::Fill(".editable-input > input:nth-child(1)".to_string()),
            FormStep::Click(".editable-submit".to_string()),
        ]
    };

    vec![
        entry(
            DestinationField::Agency,
            false,
            vec![
                FormStep::Click(
                    "#groupAttr0 > div:nth-child(1) > div:nth-child(1) > div:nth-child(1) > a:nth-child(3) > span:nth-child(3)"
                        .to_string(),
                ),
                FormStep::ClickText {
                    selector: "a".to_string(),
                    text: "Organization/Agency".to_string(),
                },
                FormStep::Fill("#orgName".to_string()),
                FormStep::Click("label[for='orgName']".to_string()),
                FormStep::Click(".save-org".to_string()),
            ],
        ),
        entry(
            DestinationField::Summary,
            false,
            vec![
                FormStep::Click("#edit-dcterms_description_0 > span:nth-child(2)".to_string()),
                FormStep::FillFrame("iframe.wysihtml5-sandbox".to_string()),
                FormStep::Click(".glyphicon-ok".to_string()),
            ],
        ),
        entry(
            DestinationField::OriginalUrl,
            false,
            inline_edit("#edit-imeta_sourceURL_0 > span:nth-child(1) > span:nth-child(2)"),
        ),
        entry(
            DestinationField::Keywords,
            true,
            vec![
                FormStep::Fill(".select2-search__field".to_string()),
                FormStep::ClickText {
                    selector: "li.select2-results__option".to_string(),
                    text: "{value}".to_string(),
                },
            ],
        ),
        entry(
            DestinationField::GeographicCoverage,
            false,
            inline_edit("#edit-dcterms_location_0 > span:nth-child(1) > span:nth-child(2)"),
        ),
        FormEntry {
            field: DestinationField::TimeStart,
            with: vec![DestinationField::TimeEnd],
            optional: false,
            steps: vec![
                FormStep::Click(
                    "#groupAttr1 > div:nth-child(1) > div:nth-child(3) > div:nth-child(1) > a:nth-child(3) > span:nth-child(3)"
                        .to_string(),
                ),
                FormStep::FillWith {
                    selector: "#startDate".to_string(),
                    text: "{time_start}".to_string(),
                },
                FormStep::FillWith {
                    selector: "#endDate".to_string(),
                    text: "{time_end}".to_string(),
                },
                FormStep::Click(".save-dates".to_string()),
            ],
        },
        entry(
            DestinationField::DataType,
            false,
            vec![
                FormStep::Click("#disco_kindOfData_0 > span:nth-child(2)".to_string()),
                FormStep::ClickText {
                    selector: ".editable-checklist span".to_string(),
                    text: "{value}".to_string(),
                },
                FormStep::Click(".editable-submit".to_string()),
            ],
        ),
        entry(
            DestinationField::CollectionNotes,
            false,
            vec![
                FormStep::Click("#edit-imeta_collectionNotes_0 > span:nth-child(2)".to_string()),
                FormStep::FillFrame("iframe.wysihtml5-sandbox".to_string()),
                FormStep::Click(".editable-submit".to_string()),
            ],
        ),
    ]
}

/// Destination field name to intermediate CSV columns.
///
/// Keys are [`DestinationField`] names; values list the columns read for
/// that field, in order.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, Vec<String>>);

impl Default for FieldMap {
    fn default() -> Self {
        let pairs: [(DestinationField, &[&str]); 13] = [
            (DestinationField::PreTitle, &["4_pre_title"]),
            (DestinationField::Title, &["4_title"]),
            (DestinationField::Agency, &["5_agency", "5_agency2"]),
            (DestinationField::Summary, &["6_summary_description"]),
            (DestinationField::OriginalUrl, &["7_original_distribution_url"]),
            (
                DestinationField::Keywords,
                &["8_subject_terms1", "8_subject_terms2", "8_keywords"],
            ),
            (DestinationField::GeographicCoverage, &["9_geographic_coverage"]),
            (DestinationField::TimeStart, &["10_time_period1"]),
            (DestinationField::TimeEnd, &["10_time_period2"]),
            (DestinationField::DataType, &["11_data_types"]),
            (DestinationField::CollectionNotes, &["12_collection_notes"]),
            (
                DestinationField::DownloadDate,
                &["12_download_date_original_source"],
            ),
            (DestinationField::Folder, &["path"]),
        ];
        Self(
            pairs
                .into_iter()
                .map(|(field, columns)| (field.as_str().to_string(), strings(columns)))
                .collect(),
        )
    }
}

impl FieldMap {
    /// Columns mapped to `field`; empty when the field is unmapped.
    #[must_use]
    pub fn columns(&self, field: DestinationField) -> &[String] {
        self.0.get(field.as_str()).map_or(&[], Vec::as_slice)
    }

    /// Overrides the columns of one field.
    pub fn set(&mut self, field: DestinationField, columns: Vec<String>) {
        self.0.insert(field.as_str().to_string(), columns);
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for key in self.0.keys() {
            key.parse::<DestinationField>()
                .map_err(|reason| ConfigError::invalid(format!("field_map.{key}"), reason))?;
        }
        Ok(())
    }
}

/// Sheet-of-record writeback.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    /// Optional header of a status column updated on writeback.
    pub status_column: Option<String>,
    pub status_value: String,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            status_column: None,
            status_value: "Done".to_string(),
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source: SourceSettings,
    pub collect: CollectSettings,
    pub upload: UploadSettings,
    pub field_map: FieldMap,
    pub reconcile: ReconcileSettings,
}

impl Settings {
    /// Loads settings from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed or validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(explicit) => explicit.to_path_buf(),
            None => match resolve_default_config_path() {
                Some(default) if default.exists() => default,
                _ => {
                    debug!("no config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let settings = Self::from_toml_str(&raw).map_err(|error| match error {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.clone(),
                source,
            },
            other => other,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(settings)
    }

    /// Parses and validates settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let source = &self.source;
        let columns = [
            source.claim_owner_column,
            source.source_url_column,
            source.download_location_column,
        ];
        if columns[0] == columns[1] || columns[0] == columns[2] || columns[1] == columns[2] {
            return Err(ConfigError::invalid(
                "source",
                "claim-owner, source-URL and download-location columns must differ",
            ));
        }
        if source.host_prefix.trim().is_empty() {
            return Err(ConfigError::invalid("source.host_prefix", "must not be empty"));
        }

        let collect = &self.collect;
        for (key, value) in [
            ("collect.probe_timeout_ms", collect.probe_timeout_ms),
            ("collect.navigation_timeout_ms", collect.navigation_timeout_ms),
            ("collect.render_timeout_ms", collect.render_timeout_ms),
            ("collect.export_timeout_ms", collect.export_timeout_ms),
            ("collect.poll_interval_ms", collect.poll_interval_ms),
            ("upload.step_timeout_ms", self.upload.step_timeout_ms),
            ("upload.poll_interval_ms", self.upload.poll_interval_ms),
            (
                "upload.upload_dialog.ack_timeout_ms",
                self.upload.upload_dialog.ack_timeout_ms,
            ),
            ("upload.nomination.timeout_ms", self.upload.nomination.timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(key, "must be greater than zero"));
            }
        }
        if collect.page_size == 0 {
            return Err(ConfigError::invalid("collect.page_size", "must be greater than zero"));
        }
        if collect.expected_exports == 0 {
            return Err(ConfigError::invalid(
                "collect.expected_exports",
                "must be at least one exported file",
            ));
        }

        let pattern = Regex::new(&self.upload.project_id_pattern).map_err(|error| {
            ConfigError::invalid("upload.project_id_pattern", error.to_string())
        })?;
        if pattern.captures_len() < 2 {
            return Err(ConfigError::invalid(
                "upload.project_id_pattern",
                "needs one capture group for the project id",
            ));
        }
        for (key, template) in [
            (
                "upload.project_url_template",
                &self.upload.project_url_template,
            ),
            (
                "upload.published_url_template",
                &self.upload.published_url_template,
            ),
        ] {
            if !template.contains("{project_id}") {
                return Err(ConfigError::invalid(key, "must contain {project_id}"));
            }
        }

        self.field_map.validate()
    }
}

impl CollectSettings {
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    #[must_use]
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    #[must_use]
    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    #[must_use]
    pub fn export_timeout(&self) -> Duration {
        Duration::from_millis(self.export_timeout_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl UploadSettings {
    #[must_use]
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn verification_timeout(&self) -> Duration {
        Duration::from_millis(self.verification_timeout_ms)
    }

    #[must_use]
    pub fn overlay_timeout(&self) -> Duration {
        Duration::from_millis(self.overlay_timeout_ms)
    }

    #[must_use]
    pub fn project_url(&self, project_id: &str) -> String {
        self.project_url_template.replace("{project_id}", project_id)
    }

    #[must_use]
    pub fn published_url(&self, project_id: &str) -> String {
        self.published_url_template.replace("{project_id}", project_id)
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/rescue/config.toml`
/// 2. `$HOME/.config/rescue/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("rescue").join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("rescue")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}
