//! Region locator.
//! Finds the start anchor (the ratings & reviews heading) and the end anchor
//! (the "see all reviews" control or the next section) by walking ordered
//! selector lists; the first selector that matches wins.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::{LocatorConfig, SelectorSpec};
use crate::error::{PageError, TargetError};
use crate::page::{BoundingBox, Page};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EndAnchor {
    Found(BoundingBox),
    /// No end selector matched; the box sits `fallback_offset` below the start.
    Fallback(BoundingBox),
}

impl EndAnchor {
    pub fn bounds(&self) -> BoundingBox {
        match self {
            EndAnchor::Found(b) | EndAnchor::Fallback(b) => *b,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, EndAnchor::Fallback(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Anchors {
    pub start: BoundingBox,
    pub end: EndAnchor,
}

/// First candidate that matches, with its index. Lookup errors on a single
/// candidate count as "no match" so one bad selector does not end the chain.
pub async fn first_match<P: Page + ?Sized>(
    page: &P,
    candidates: &[SelectorSpec],
) -> Option<(usize, BoundingBox)> {
    for (i, selector) in candidates.iter().enumerate() {
        match page.find_box(selector).await {
            Ok(Some(found)) => return Some((i, found)),
            Ok(None) => debug!("selector {} did not match: {}", i + 1, selector),
            Err(e) => debug!("selector {} failed: {} ({})", i + 1, selector, e),
        }
    }
    None
}

/// Re-evaluates the chain until something matches or `timeout` expires.
async fn first_match_within<P: Page + ?Sized>(
    page: &P,
    candidates: &[SelectorSpec],
    timeout: Duration,
    poll: Duration,
) -> Option<(usize, BoundingBox)> {
    let started = Instant::now();
    loop {
        if let Some(hit) = first_match(page, candidates).await {
            return Some(hit);
        }
        if started.elapsed() >= timeout {
            return None;
        }
        sleep(poll).await;
    }
}

pub fn fallback_end(start: BoundingBox, offset: f64) -> BoundingBox {
    BoundingBox::new(start.x, start.y + offset, 0.0, 0.0)
}

pub async fn locate<P: Page + ?Sized>(
    page: &P,
    config: &LocatorConfig,
    poll: Duration,
) -> Result<Anchors, TargetError> {
    let timeout = Duration::from_millis(config.start_timeout_ms);
    let Some((i, start)) = first_match_within(page, &config.start, timeout, poll).await else {
        return Err(TargetError::StartAnchorMissing {
            tried: config.start.len(),
        });
    };
    info!("start anchor matched selector {}: {}", i + 1, config.start[i]);

    let end = match first_match(page, &config.end).await {
        Some((i, end)) => {
            info!("end anchor matched selector {}: {}", i + 1, config.end[i]);
            EndAnchor::Found(end)
        }
        None => {
            warn!(
                "no end anchor matched, assuming content is {}px tall",
                config.fallback_offset
            );
            EndAnchor::Fallback(fallback_end(start, config.fallback_offset))
        }
    };
    Ok(Anchors { start, end })
}

/// Full document height, for sizing the window before a full-page screenshot.
pub async fn document_height<P: Page + ?Sized>(page: &P) -> Result<u32, PageError> {
    let value = page
        .execute("return Math.max(document.body.scrollHeight, document.documentElement.scrollHeight)")
        .await?;
    value
        .as_f64()
        .map(|h| h.max(0.0).round() as u32)
        .ok_or_else(|| PageError::Script(format!("scrollHeight was {}", value)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::page::fixture::{FixturePage, FixtureSite};

    fn xpath(s: &str) -> SelectorSpec {
        SelectorSpec::Xpath(s.to_string())
    }

    fn config() -> LocatorConfig {
        LocatorConfig {
            start: vec![xpath("//h2[1]"), xpath("//h2[2]")],
            end: vec![xpath("//span[1]"), xpath("//span[2]")],
            fallback_offset: 2000.0,
            start_timeout_ms: 0,
        }
    }

    fn page_with(elements: &[(&str, BoundingBox)]) -> FixturePage {
        let elements: HashMap<_, _> = elements.iter().map(|(s, b)| (xpath(s), *b)).collect();
        FixturePage::new(vec![("", FixtureSite { elements, page_height: 3000, ..FixtureSite::default() })])
    }

    #[tokio::test]
    async fn test_first_match_respects_list_order() {
        let a = BoundingBox::new(0.0, 10.0, 1.0, 1.0);
        let b = BoundingBox::new(0.0, 20.0, 1.0, 1.0);
        let page = page_with(&[("//h2[2]", b), ("//h2[1]", a)]);
        let hit = first_match(&page, &config().start).await;
        assert_eq!(hit, Some((0, a)));
    }

    #[tokio::test]
    async fn test_later_candidate_used_when_earlier_missing() {
        let b = BoundingBox::new(5.0, 20.0, 1.0, 1.0);
        let page = page_with(&[("//h2[2]", b)]);
        assert_eq!(first_match(&page, &config().start).await, Some((1, b)));
    }

    #[tokio::test]
    async fn test_missing_start_fails_target() {
        let page = page_with(&[("//span[1]", BoundingBox::new(0.0, 0.0, 1.0, 1.0))]);
        let err = locate(&page, &config(), Duration::from_millis(1)).await.unwrap_err();
        assert!(matches!(err, TargetError::StartAnchorMissing { tried: 2 }));
    }

    #[tokio::test]
    async fn test_missing_end_falls_back_below_start() {
        let start = BoundingBox::new(300.0, 900.0, 200.0, 40.0);
        let page = page_with(&[("//h2[1]", start)]);
        let anchors = locate(&page, &config(), Duration::from_millis(1)).await.unwrap();
        assert!(anchors.end.is_fallback());
        assert_eq!(anchors.end.bounds(), BoundingBox::new(300.0, 2900.0, 0.0, 0.0));
    }

    #[tokio::test]
    async fn test_document_height_reads_script_result() {
        let page = page_with(&[]);
        page.goto("https://example.com").await.unwrap();
        assert_eq!(document_height(&page).await.unwrap(), 3000);
    }
}
