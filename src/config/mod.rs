//! Configuration management for the tdcrawl crawler
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files. The defaults carry the compiled-in contract of
//! the target site (URLs, selectors, id prefix).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub use crate::utils::retry::RetryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target site contract
    pub site: SiteConfig,

    /// Crawl behavior
    pub crawl: CrawlConfig,

    /// Render readiness
    pub settle: SettleConfig,

    /// Retry policy at the renderer boundary
    pub retry: RetryConfig,

    /// Browser configuration
    pub renderer: RendererConfig,

    /// Output configuration
    pub output: OutputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// URLs and selectors of the crawled directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Page holding the category navigation
    pub root_url: String,

    /// One match per category grouping; each holds the category anchors
    pub navigation_selector: String,

    /// Listing card elements on a category page
    pub card_selector: String,

    /// Literal prefix of a card `id` before the decimal identifier
    pub card_id_prefix: String,

    /// Query parameter requesting a single oversized listing page
    pub page_size_param: String,

    /// Detail page URL, `{id}` is replaced by the identifier
    pub detail_url_template: String,

    /// Title element of a detail page
    pub title_selector: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root_url: String::from(
                "https://www.questdiagnostics.com/healthcare-professionals/test-directory",
            ),
            navigation_selector: String::from(
                "#a2zContainer > div.component-body-area > div.a2z-area > ul > li",
            ),
            card_selector: String::from("md-card"),
            card_id_prefix: String::from("MASTER"),
            page_size_param: String::from("rows=4000"),
            detail_url_template: String::from(
                "https://testdirectory.questdiagnostics.com/test/test-detail/{id}/complement-component-c3c?p=r&q=*&cc=MASTER",
            ),
            title_selector: String::from(".qd-header__title-mobile.ng-binding"),
        }
    }
}

impl SiteConfig {
    /// Detail page URL for one identifier
    #[must_use]
    pub fn detail_url(&self, identifier: impl std::fmt::Display) -> String {
        self.detail_url_template
            .replace("{id}", &identifier.to_string())
    }
}

/// Which category links the item enumerator visits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryScope {
    /// Stop after the first category link
    First,
    /// Visit every category link
    All,
}

/// Which child of the title node supplies the item name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    /// First text child with visible content
    FirstText,
    /// Text content of the first element child
    FirstElement,
}

/// What a renderer failure on one detail page does to the rest of the stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and continue with the next identifier
    Isolate,
    /// Stop extracting the remaining identifiers
    Abort,
}

macro_rules! impl_from_str {
    ($ty:ty, $($text:literal => $variant:expr),+ $(,)?) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.to_lowercase().replace('-', "_").as_str() {
                    $($text => Ok($variant),)+
                    other => Err(format!(
                        "unknown value '{other}', expected one of: {}",
                        [$($text),+].join(", ")
                    )),
                }
            }
        }
    };
}

impl_from_str!(CategoryScope, "first" => CategoryScope::First, "all" => CategoryScope::All);
impl_from_str!(
    NameSource,
    "first_text" => NameSource::FirstText,
    "first_element" => NameSource::FirstElement,
);
impl_from_str!(
    FailurePolicy,
    "isolate" => FailurePolicy::Isolate,
    "abort" => FailurePolicy::Abort,
);

/// Crawl behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub category_scope: CategoryScope,
    pub name_source: NameSource,
    pub failure_policy: FailurePolicy,

    /// Maximum number of detail pages per run (`None` = all)
    pub max_items: Option<usize>,

    /// Capture a full-page screenshot of each detail page
    pub screenshot: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            category_scope: CategoryScope::First,
            name_source: NameSource::FirstText,
            failure_policy: FailurePolicy::Isolate,
            max_items: None,
            screenshot: true,
        }
    }
}

/// How a stage waits for client-side rendering after navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleMode {
    /// Sleep for `delay_ms`
    Fixed,
    /// Poll the stage selector until its match count is stable
    Poll,
}

/// Render readiness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    pub mode: SettleMode,

    /// Fixed-mode delay
    pub delay_ms: u64,

    /// Poll-mode upper bound
    pub timeout_ms: u64,

    /// Poll-mode first interval, doubled after each poll
    pub poll_interval_ms: u64,

    /// Poll-mode interval cap
    pub max_poll_interval_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            mode: SettleMode::Poll,
            delay_ms: 5000,
            timeout_ms: 15_000,
            poll_interval_ms: 250,
            max_poll_interval_ms: 2000,
        }
    }
}

impl SettleConfig {
    /// Fixed-delay settling
    pub fn fixed(delay: Duration) -> Self {
        Self {
            mode: SettleMode::Fixed,
            delay_ms: delay.as_millis() as u64,
            ..Default::default()
        }
    }

    /// Settling that returns as soon as the page is queried, for tests and
    /// pre-rendered documents
    pub fn immediate() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_millis(self.max_poll_interval_ms)
    }
}

/// Browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Run Chromium without a window
    pub headless: bool,

    /// Timeout of one DevTools request in seconds
    pub request_timeout_secs: u64,

    /// Navigation rate limit (0 = unlimited)
    pub navigations_per_second: u32,

    /// Chromium binary, detected when unset
    pub chrome_executable: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            headless: true,
            request_timeout_secs: 60,
            navigations_per_second: 2,
            chrome_executable: None,
        }
    }
}

impl RendererConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where the last detail-page screenshot is written
    pub screenshot_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            screenshot_path: PathBuf::from("fullScreenshot.png"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables over the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Override fields from `TDCRAWL_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(root_url) = std::env::var("TDCRAWL_ROOT_URL") {
            self.site.root_url = root_url;
        }
        if let Some(scope) = env_parse::<CategoryScope>("TDCRAWL_CATEGORY_SCOPE") {
            self.crawl.category_scope = scope;
        }
        if let Some(policy) = env_parse::<FailurePolicy>("TDCRAWL_FAILURE_POLICY") {
            self.crawl.failure_policy = policy;
        }
        if let Some(max_items) = env_parse::<usize>("TDCRAWL_MAX_ITEMS") {
            self.crawl.max_items = Some(max_items);
        }
        if let Some(max_retries) = env_parse::<u32>("TDCRAWL_MAX_RETRIES") {
            self.retry.max_retries = max_retries;
        }
        if let Some(rate) = env_parse::<u32>("TDCRAWL_NAVIGATIONS_PER_SECOND") {
            self.renderer.navigations_per_second = rate;
        }
        if let Some(headless) = env_parse::<bool>("TDCRAWL_HEADLESS") {
            self.renderer.headless = headless;
        }
        if let Ok(path) = std::env::var("TDCRAWL_CHROME") {
            self.renderer.chrome_executable = Some(PathBuf::from(path));
        }
        if let Ok(level) = std::env::var("TDCRAWL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TDCRAWL_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))
    }

    /// Parse configuration from TOML text; missing keys keep their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.site.root_url)
            .with_context(|| format!("root_url is not a valid URL: {}", self.site.root_url))?;

        if !self.site.detail_url_template.contains("{id}") {
            anyhow::bail!("detail_url_template must contain the {{id}} placeholder");
        }

        for (name, selector) in [
            ("navigation_selector", &self.site.navigation_selector),
            ("card_selector", &self.site.card_selector),
            ("title_selector", &self.site.title_selector),
        ] {
            scraper::Selector::parse(selector)
                .map_err(|e| anyhow::anyhow!("{name} is not a valid CSS selector ({selector}): {e}"))?;
        }

        if self.settle.mode == SettleMode::Poll {
            if self.settle.poll_interval_ms == 0 {
                anyhow::bail!("poll_interval_ms must be greater than 0");
            }
            if self.settle.timeout_ms == 0 {
                anyhow::bail!("timeout_ms must be greater than 0 in poll mode");
            }
        }

        if self.retry.backoff_multiplier < 1.0 {
            anyhow::bail!("backoff_multiplier must be at least 1.0");
        }

        if self.renderer.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.crawl.max_items == Some(0) {
            anyhow::bail!("max_items must be greater than 0 when set");
        }

        Ok(())
    }

    /// Get DevTools request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.renderer.request_timeout()
    }
}
