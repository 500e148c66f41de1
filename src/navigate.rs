//! Page navigation.
//! Loads a target's store page, waits for the document to report ready,
//! overrides `navigator.language`, and makes sure the `hl` parameter is on the
//! URL (re-navigating if the store dropped it).

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::catalog::Target;
use crate::config::NavigationConfig;
use crate::error::{PageError, TargetError};
use crate::page::Page;

const READY_STATE_SCRIPT: &str = "return document.readyState";

const LOCALE_OVERRIDE_SCRIPT: &str = r#"
if (navigator.language !== 'ko-KR') {
    Object.defineProperty(navigator, 'language', { get: function() { return 'ko-KR'; } });
}
if (navigator.languages) {
    Object.defineProperty(navigator, 'languages', { get: function() { return ['ko-KR', 'ko', 'en-US', 'en']; } });
}
"#;

pub fn store_url(template: &str, target: &Target) -> String {
    template.replace("{id}", &target.app_id)
}

/// `url` with `hl={language}`, or `None` when it already carries it.
pub fn with_language(url: &str, language: &str) -> Result<Option<String>, PageError> {
    let mut parsed = Url::parse(url).map_err(|source| PageError::Url {
        url: url.to_string(),
        source,
    })?;
    if parsed.query_pairs().any(|(k, v)| k == "hl" && v == language) {
        return Ok(None);
    }
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| k != "hl")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    parsed
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("hl", language);
    Ok(Some(parsed.to_string()))
}

/// Polls `document.readyState` until it is `complete` or `timeout` expires.
pub async fn wait_ready<P: Page + ?Sized>(
    page: &P,
    timeout: Duration,
    poll: Duration,
) -> Result<(), TargetError> {
    let started = Instant::now();
    loop {
        let state = page.execute(READY_STATE_SCRIPT).await?;
        if state.as_str() == Some("complete") {
            debug!(elapsed = ?started.elapsed(), "document ready");
            return Ok(());
        }
        if started.elapsed() >= timeout {
            return Err(TargetError::Timeout {
                what: "document ready",
                waited: timeout,
            });
        }
        sleep(poll).await;
    }
}

/// Loads `target`'s page in the configured language.
pub async fn open_target<P: Page + ?Sized>(
    page: &P,
    target: &Target,
    config: &NavigationConfig,
) -> Result<(), TargetError> {
    let url = store_url(&config.url_template, target);
    info!(target = %target.name, url = %url, "opening store page");
    page.goto(&url).await?;
    settle(page, config).await?;

    if let Err(e) = page.execute(LOCALE_OVERRIDE_SCRIPT).await {
        warn!(target = %target.name, "locale override failed: {}", e);
    }

    let current = page.current_url().await?;
    if let Some(localized) = with_language(&current, &config.language)? {
        info!(target = %target.name, url = %localized, "re-opening with language parameter");
        page.goto(&localized).await?;
        settle(page, config).await?;
    }
    Ok(())
}

async fn settle<P: Page + ?Sized>(page: &P, config: &NavigationConfig) -> Result<(), TargetError> {
    wait_ready(page, config.ready_timeout(), config.poll_interval()).await?;
    if config.settle_ms > 0 {
        sleep(Duration::from_millis(config.settle_ms)).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::fixture::{FixturePage, FixtureSite};

    fn quick_config() -> NavigationConfig {
        NavigationConfig {
            ready_timeout_ms: 50,
            poll_interval_ms: 1,
            settle_ms: 0,
            ..NavigationConfig::default()
        }
    }

    #[test]
    fn test_with_language_appends_or_skips() {
        let url = "https://play.google.com/store/apps/details?id=com.example";
        assert_eq!(
            with_language(url, "ko").unwrap().as_deref(),
            Some("https://play.google.com/store/apps/details?id=com.example&hl=ko")
        );
        assert_eq!(with_language(&format!("{url}&hl=ko"), "ko").unwrap(), None);
        assert_eq!(
            with_language(&format!("{url}&hl=en"), "ko").unwrap().as_deref(),
            Some("https://play.google.com/store/apps/details?id=com.example&hl=ko")
        );
        assert_eq!(
            with_language("https://example.com/page", "ko").unwrap().as_deref(),
            Some("https://example.com/page?hl=ko")
        );
    }

    #[test]
    fn test_with_language_rejects_garbage() {
        assert!(matches!(with_language("not a url", "ko"), Err(PageError::Url { .. })));
    }

    #[tokio::test]
    async fn test_wait_ready_polls_until_complete() {
        let page = FixturePage::new(vec![]);
        *page.loading_polls.lock().unwrap() = 3;
        wait_ready(&page, Duration::from_secs(1), Duration::from_millis(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_ready_times_out() {
        let page = FixturePage::new(vec![]);
        *page.loading_polls.lock().unwrap() = u32::MAX;
        let err = wait_ready(&page, Duration::from_millis(20), Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TargetError::Timeout { what: "document ready", .. }));
    }

    #[tokio::test]
    async fn test_open_target_renavigates_with_language() {
        let page = FixturePage::new(vec![("com.example", FixtureSite::default())]);
        let target = Target::new("com.example", "Example", "예시");
        open_target(&page, &target, &quick_config()).await.unwrap();

        let visited = page.visited.lock().unwrap().clone();
        assert_eq!(
            visited,
            vec![
                "https://play.google.com/store/apps/details?id=com.example".to_string(),
                "https://play.google.com/store/apps/details?id=com.example&hl=ko".to_string(),
            ]
        );
    }
}
