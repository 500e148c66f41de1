//! Driver bootstrap.
//! Checks that the WebDriver server (geckodriver / chromedriver) is up, then
//! opens one browser session with a fixed viewport, spoofed user agent and
//! locale, and automation flags turned down. The session is shared by every
//! target in a run.
//! Anything failing here is an environment error: the run is aborted.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thirtyfour::prelude::*;
use thirtyfour::{ChromeCapabilities, ChromiumLikeCapabilities, FirefoxCapabilities};
use thirtyfour::common::capabilities::firefox::FirefoxPreferences;
use tracing::{debug, info, warn};

use crate::config::{BrowserConfig, BrowserKind, SelectorSpec};
use crate::error::{EnvironmentError, PageError};
use crate::page::{BoundingBox, Page};

// *************** Server check ***************

#[derive(Deserialize)]
struct StatusResponse {
    value: StatusValue,
}

#[derive(Deserialize)]
struct StatusValue {
    #[serde(default = "default_ready")]
    ready: bool,
    #[serde(default)]
    message: String,
}

fn default_ready() -> bool {
    true
}

/// `GET {server}/status`. geckodriver answers `ready: false` while a session
/// is already open.
async fn check_server(config: &BrowserConfig) -> Result<(), EnvironmentError> {
    let url = format!("{}/status", config.server_url.trim_end_matches('/'));
    let unreachable = |source| EnvironmentError::ServerUnreachable {
        url: config.server_url.clone(),
        source,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.status_timeout_secs))
        .build()
        .map_err(unreachable)?;
    let status: StatusResponse = client
        .get(&url)
        .send()
        .await
        .map_err(unreachable)?
        .json()
        .await
        .map_err(unreachable)?;

    if !status.value.ready {
        return Err(EnvironmentError::ServerNotReady {
            url: config.server_url.clone(),
            message: status.value.message,
        });
    }
    debug!(url = %url, message = %status.value.message, "webdriver server ready");
    Ok(())
}

// *************** Capabilities ***************

fn firefox_capabilities(config: &BrowserConfig) -> WebDriverResult<FirefoxCapabilities> {
    let mut caps = DesiredCapabilities::firefox();
    if config.headless {
        caps.set_headless()?;
    }
    caps.add_arg(&format!("--width={}", config.width))?;
    caps.add_arg(&format!("--height={}", config.height))?;

    let mut prefs = FirefoxPreferences::new();
    prefs.set("dom.webdriver.enabled", false)?;
    prefs.set("useAutomationExtension", false)?;
    prefs.set_user_agent(config.user_agent.clone())?;
    prefs.set("intl.accept_languages", config.accept_language.clone())?;
    prefs.set("general.useragent.locale", config.locale.clone())?;
    prefs.set("layout.css.devPixelsPerPx", "1.0")?;
    if config.disable_cache {
        prefs.set("browser.cache.disk.enable", false)?;
        prefs.set("browser.cache.memory.enable", false)?;
    }
    caps.set_preferences(prefs)?;
    Ok(caps)
}

fn chrome_capabilities(config: &BrowserConfig) -> WebDriverResult<ChromeCapabilities> {
    let mut caps = DesiredCapabilities::chrome();
    for arg in chrome_args(config) {
        caps.add_arg(&arg)?;
    }
    caps.add_experimental_option(
        "prefs",
        serde_json::json!({ "intl.accept_languages": config.accept_language }),
    )?;
    Ok(caps)
}

fn chrome_args(config: &BrowserConfig) -> Vec<String> {
    let mut args = vec![
        format!("--window-size={},{}", config.width, config.height),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        format!("--lang={}", config.locale),
        format!("--user-agent={}", config.user_agent),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
    }
    if config.disable_cache {
        args.push("--disk-cache-size=0".to_string());
    }
    args
}

// *************** Session ***************

/// A live browser session.
pub struct WebDriverPage {
    driver: WebDriver,
}

/// Checks the server is up, opens a session and applies viewport and timeouts.
pub async fn launch(config: &BrowserConfig) -> Result<WebDriverPage, EnvironmentError> {
    check_server(config).await?;

    let session = |e: WebDriverError| EnvironmentError::Session(PageError::from(e));
    let driver = match config.kind {
        BrowserKind::Firefox => {
            let caps = firefox_capabilities(config).map_err(session)?;
            WebDriver::new(&config.server_url, caps).await.map_err(session)?
        }
        BrowserKind::Chrome => {
            let caps = chrome_capabilities(config).map_err(session)?;
            WebDriver::new(&config.server_url, caps).await.map_err(session)?
        }
    };

    let page_load = Duration::from_secs(config.page_load_timeout_secs);
    let timeouts = TimeoutConfiguration::new(Some(page_load), Some(page_load), Some(Duration::ZERO));
    if let Err(e) = driver.update_timeouts(timeouts).await {
        warn!("Failed to set timeouts: {}", e);
    }
    if let Err(e) = driver.set_window_rect(0, 0, config.width, config.height).await {
        warn!("Failed to set viewport: {}", e);
    }

    info!(browser = %config.kind, headless = config.headless, "browser session opened");
    Ok(WebDriverPage { driver })
}

impl WebDriverPage {
    pub async fn quit(self) {
        match self.driver.quit().await {
            Ok(()) => info!("browser session closed"),
            Err(e) => warn!("Failed to close browser session: {}", e),
        }
    }
}

fn by(selector: &SelectorSpec) -> By {
    match selector {
        SelectorSpec::Xpath(expr) => By::XPath(expr.as_str()),
        SelectorSpec::Css(expr) => By::Css(expr.as_str()),
    }
}

#[async_trait]
impl Page for WebDriverPage {
    async fn goto(&self, url: &str) -> Result<(), PageError> {
        self.driver.goto(url).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, PageError> {
        Ok(self.driver.current_url().await?.to_string())
    }

    async fn execute(&self, script: &str) -> Result<Value, PageError> {
        let ret = self.driver.execute(script, Vec::new()).await?;
        Ok(ret.json().clone())
    }

    async fn find_box(&self, selector: &SelectorSpec) -> Result<Option<BoundingBox>, PageError> {
        let elements = self.driver.find_all(by(selector)).await?;
        let Some(element) = elements.first() else {
            return Ok(None);
        };
        let rect = element.rect().await?;
        Ok(Some(BoundingBox::new(rect.x, rect.y, rect.width, rect.height)))
    }

    async fn set_window_size(&self, width: u32, height: u32) -> Result<(), PageError> {
        self.driver.set_window_rect(0, 0, width, height).await?;
        Ok(())
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, PageError> {
        Ok(self.driver.screenshot_as_png().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_args_follow_config() {
        let mut config = BrowserConfig::default();
        config.kind = BrowserKind::Chrome;
        config.headless = false;
        let args = chrome_args(&config);
        assert!(args.contains(&"--window-size=1920,1200".to_string()));
        assert!(args.contains(&"--lang=ko-KR".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--headless")));

        config.headless = true;
        assert!(chrome_args(&config).iter().any(|a| a.starts_with("--headless")));
    }

    #[test]
    fn test_status_response_defaults_ready() {
        let status: StatusResponse = serde_json::from_str(r#"{"value": {"message": "ok"}}"#).unwrap();
        assert!(status.value.ready);
        let busy: StatusResponse =
            serde_json::from_str(r#"{"value": {"ready": false, "message": "Session already started"}}"#)
                .unwrap();
        assert!(!busy.value.ready);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_environment_error() {
        let mut config = BrowserConfig::default();
        config.server_url = "http://127.0.0.1:1".to_string();
        config.status_timeout_secs = 1;
        let err = check_server(&config).await.unwrap_err();
        assert!(matches!(err, EnvironmentError::ServerUnreachable { .. }));
    }

    #[tokio::test]
    #[ignore = "requires a running geckodriver on localhost:4444"]
    async fn test_real_session_opens() {
        let page = launch(&BrowserConfig::default()).await.expect("launch failed");
        page.goto("about:blank").await.unwrap();
        page.quit().await;
    }
}
