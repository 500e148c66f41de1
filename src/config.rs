//! Config module.
//! Manages I/O for capture.json (targets, browser, selectors, crop geometry,
//! dashboard, schedule, publish). Uses serde for JSON serialization.
//! Falls back to built-in defaults when the file is missing; every field has a
//! default so partial files are fine.
//! Selector lists and crop geometry go stale whenever the store page markup
//! changes, so they live here rather than in code.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::catalog::{self, BusinessUnit, Target};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the `YYYYMMDD/` capture folders.
    pub archive_root: PathBuf,
    pub targets: Vec<Target>,
    pub business_units: Vec<BusinessUnit>,
    pub browser: BrowserConfig,
    pub navigation: NavigationConfig,
    pub locator: LocatorConfig,
    pub geometry: CropGeometry,
    pub dashboard: DashboardConfig,
    pub schedule: ScheduleConfig,
    pub publish: PublishConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            archive_root: PathBuf::from("."),
            targets: catalog::default_targets(),
            business_units: catalog::default_business_units(),
            browser: BrowserConfig::default(),
            navigation: NavigationConfig::default(),
            locator: LocatorConfig::default(),
            geometry: CropGeometry::default(),
            dashboard: DashboardConfig::default(),
            schedule: ScheduleConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config at `path`, or the defaults if it does not exist.
    /// A relative `archive_root` is taken relative to the config file's
    /// directory, not the working directory.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: Self = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?;
            if config.targets.is_empty() {
                anyhow::bail!("Config {} lists no targets", path.display());
            }
            config
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.archive_root = resolve(&base_dir(path), &config.archive_root);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, text).with_context(|| format!("Failed to write config: {}", path.display()))
    }

    /// Path of the dashboard document, resolved against the archive root.
    pub fn dashboard_path(&self) -> PathBuf {
        self.archive_root.join(&self.dashboard.path)
    }
}

/// Directory that relative paths in the config at `config_path` (and the
/// `logs/` folder) hang off.
pub fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || base == Path::new(".") {
        path.to_path_buf()
    } else if path == Path::new(".") {
        base.to_path_buf()
    } else {
        base.join(path)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Firefox,
    Chrome,
}

impl std::fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrowserKind::Firefox => write!(f, "Firefox"),
            BrowserKind::Chrome => write!(f, "Chrome"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub kind: BrowserKind,
    /// WebDriver server (geckodriver defaults to 4444, chromedriver to 9515).
    pub server_url: String,
    pub headless: bool,
    pub width: u32,
    pub height: u32,
    pub user_agent: String,
    pub accept_language: String,
    pub locale: String,
    pub disable_cache: bool,
    pub page_load_timeout_secs: u64,
    pub status_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            kind: BrowserKind::Firefox,
            server_url: "http://localhost:4444".to_string(),
            headless: true,
            width: 1920,
            height: 1200,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0"
                .to_string(),
            accept_language: "ko-KR,ko;q=0.9,en;q=0.8".to_string(),
            locale: "ko-KR".to_string(),
            disable_cache: true,
            page_load_timeout_secs: 60,
            status_timeout_secs: 5,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// `{id}` is replaced with the target's app id.
    pub url_template: String,
    /// Value of the `hl` query parameter forced on every page.
    pub language: String,
    pub ready_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Extra delay after the document reports ready, for client-side rendering.
    pub settle_ms: u64,
    /// Delay between targets.
    pub between_targets_ms: u64,
    /// Upper bound for the full-page window height.
    pub max_page_height: u32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            url_template: "https://play.google.com/store/apps/details?id={id}".to_string(),
            language: "ko".to_string(),
            ready_timeout_ms: 10_000,
            poll_interval_ms: 250,
            settle_ms: 3_000,
            between_targets_ms: 2_000,
            max_page_height: 16_000,
        }
    }
}

impl NavigationConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// One selector candidate, written as `{"xpath": "..."}` or `{"css": "..."}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorSpec {
    Xpath(String),
    Css(String),
}

impl std::fmt::Display for SelectorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectorSpec::Xpath(expr) => write!(f, "xpath:{}", expr),
            SelectorSpec::Css(expr) => write!(f, "css:{}", expr),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub start: Vec<SelectorSpec>,
    pub end: Vec<SelectorSpec>,
    /// Assumed content height below the start anchor when no end anchor matches.
    pub fallback_offset: f64,
    /// How long the start chain is retried before the target fails.
    pub start_timeout_ms: u64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        let xpath = |s: &str| SelectorSpec::Xpath(s.to_string());
        Self {
            start: vec![
                xpath("//h2[text()='평점 및 리뷰']"),
                xpath("//h2[contains(text(), '평점')]"),
                xpath("//h2[contains(text(), '리뷰')]"),
                xpath("//div[contains(text(), '평점 및 리뷰')]"),
                xpath("//span[contains(text(), '평점 및 리뷰')]"),
            ],
            end: vec![
                xpath("//div[@role='button']//span[text()='리뷰 모두 보기']"),
                xpath("//span[text()='리뷰 모두 보기']"),
                xpath("//div[contains(text(), '리뷰 모두 보기')]"),
                xpath("//button[contains(text(), '리뷰 모두 보기')]"),
                xpath("//a[contains(text(), '리뷰 모두 보기')]"),
                xpath("//div[contains(text(), '새로운 기능')]"),
                xpath("//h3[contains(text(), '새로운 기능')]"),
                xpath("//div[contains(text(), '부적절한 앱으로 신고')]"),
                xpath("//a[contains(text(), '부적절한 앱으로 신고')]"),
            ],
            fallback_offset: 2000.0,
            start_timeout_ms: 5_000,
        }
    }
}

/// How the bottom edge of the crop is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BottomRule {
    /// `top + height`.
    FixedHeight(u32),
    /// Bottom edge of the end anchor plus padding.
    EndAnchor { padding: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropGeometry {
    pub margin_left: u32,
    pub margin_top: u32,
    pub width: u32,
    pub bottom: BottomRule,
    pub min_height: u32,
}

impl Default for CropGeometry {
    fn default() -> Self {
        Self {
            margin_left: 100,
            margin_top: 100,
            width: 1000,
            bottom: BottomRule::FixedHeight(1800),
            min_height: 1800,
        }
    }
}

/// How dates are written in option labels and card headings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateStyle {
    /// `2025-01-15`
    #[default]
    Dashed,
    /// `2025년 01월 15일`
    Korean,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Relative to `archive_root`.
    pub path: PathBuf,
    pub date_style: DateStyle,
    pub comparison_sections: bool,
    pub backup: bool,
    pub backup_dir: PathBuf,
    pub stat_labels: StatLabels,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("aos_review.html"),
            date_style: DateStyle::Dashed,
            comparison_sections: true,
            backup: true,
            backup_dir: PathBuf::from("backups"),
            stat_labels: StatLabels::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StatLabels {
    pub capture_days: String,
    pub total_images: String,
    pub latest: String,
}

impl Default for StatLabels {
    fn default() -> Self {
        Self {
            capture_days: "캡처 일수".to_string(),
            total_images: "총 이미지".to_string(),
            latest: "최근 캡처".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Daily trigger, local time, `HH:MM`.
    pub at: String,
    pub poll_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    /// Windows task name used by `install-task`.
    pub task_name: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            at: "00:10".to_string(),
            poll_secs: 60,
            max_retries: 3,
            retry_delay_secs: 30,
            task_name: "AOS_Review_Auto_Capture".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub enabled: bool,
    pub remote: String,
    pub branch: String,
    pub commit_prefix: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            remote: "origin".to_string(),
            branch: "main".to_string(),
            commit_prefix: "Auto update".to_string(),
        }
    }
}
