//! Typed shape of `harvest.yaml`.
use harvest_common::{Locator, OutputFormat};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    pub version: Option<String>,
    #[serde(default)]
    pub driver: DriverSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub scenarios: Vec<ScenarioSpec>,
}

impl HarvestConfig {
    pub fn scenario(&self, name: &str) -> Option<&ScenarioSpec> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    pub fn scenario_names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Browser session and page-fetch settings shared by every scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverSettings {
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default = "yes")]
    pub headless: bool,
    #[serde(default = "yes")]
    pub maximize: bool,
    #[serde(default)]
    pub window_size: Option<[u32; 2]>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_http_retries")]
    pub http_retries: u32,
    /// How long a container bind waits for its element.
    #[serde(default = "default_bind_timeout_ms")]
    pub bind_timeout_ms: u64,
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: true,
            maximize: true,
            window_size: None,
            user_agent: None,
            extra_args: Vec::new(),
            http_timeout_secs: default_http_timeout_secs(),
            http_retries: default_http_retries(),
            bind_timeout_ms: default_bind_timeout_ms(),
            poll_ms: default_poll_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub stderr: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Webdriver,
    Static,
}

/// One predefined harvesting job, selectable by name.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub backend: Backend,
    pub url: String,
    pub container: ContainerSpec,
    #[serde(default)]
    pub pagination: PaginationSpec,
    pub output: OutputSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub locator: Locator,
    #[serde(default)]
    pub fields: Vec<Locator>,
    #[serde(default)]
    pub rows: Option<RowSpec>,
    #[serde(default)]
    pub children: Vec<ContainerSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RowSpec {
    pub common: Locator,
    pub fields: Vec<Locator>,
    #[serde(default)]
    pub filter: RowFilterSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowFilterSpec {
    #[default]
    Any,
    MoreThan { locator: Locator, count: usize },
    HasText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationKindSpec {
    Disabled,
    NextButton,
    UrlTemplate,
    InfiniteScroll,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationSpec {
    /// Preferred strategy; inferred from the other settings when absent.
    #[serde(default)]
    pub kind: Option<PaginationKindSpec>,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default)]
    pub next_button: Option<Locator>,
    #[serde(default = "default_bind_timeout_ms")]
    pub next_timeout_ms: u64,
    /// URL pattern with a `{page}` placeholder.
    #[serde(default)]
    pub url_template: Option<String>,
    #[serde(default)]
    pub last_page: Option<u32>,
    #[serde(default)]
    pub infinite_scroll: bool,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for PaginationSpec {
    fn default() -> Self {
        Self {
            kind: None,
            max_pages: default_max_pages(),
            next_button: None,
            next_timeout_ms: default_bind_timeout_ms(),
            url_template: None,
            last_page: None,
            infinite_scroll: false,
            settle_ms: default_settle_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSpec {
    /// Target path without extension.
    pub path: PathBuf,
    pub format: OutputFormat,
}

fn yes() -> bool {
    true
}
fn default_webdriver_url() -> String {
    "http://localhost:9515".into()
}
fn default_http_timeout_secs() -> u64 {
    15
}
fn default_http_retries() -> u32 {
    2
}
fn default_bind_timeout_ms() -> u64 {
    10_000
}
fn default_poll_ms() -> u64 {
    250
}
fn default_max_pages() -> u32 {
    1
}
fn default_settle_ms() -> u64 {
    2_000
}
