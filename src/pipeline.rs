//! Capture pipeline.
//! One run: open a browser session, capture every target in catalog order
//! into today's date folder, then patch the dashboard with what was captured.
//! A failing target is logged and skipped; only an environment failure ends
//! the run early.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::archive::{self, CaptureDate};
use crate::capture::{self, CropPlan};
use crate::catalog::Target;
use crate::config::AppConfig;
use crate::dashboard::{self, PatchReport};
use crate::driver;
use crate::error::{EnvironmentError, PatchError, TargetError};
use crate::locate;
use crate::navigate;
use crate::page::Page;

#[derive(Debug)]
pub enum TargetOutcome {
    Captured {
        path: PathBuf,
        /// The end anchor was missing or the crop fell back to the full image.
        degraded: bool,
        plan: CropPlan,
    },
    Failed(TargetError),
}

#[derive(Debug)]
pub struct TargetResult {
    pub name: String,
    pub outcome: TargetOutcome,
}

#[derive(Debug)]
pub struct RunReport {
    pub date: CaptureDate,
    pub results: Vec<TargetResult>,
    /// `None` when nothing was captured and the dashboard was left alone.
    pub dashboard: Option<Result<PatchReport, PatchError>>,
}

impl RunReport {
    pub fn captured(&self) -> impl Iterator<Item = &TargetResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, TargetOutcome::Captured { .. }))
    }

    pub fn captured_count(&self) -> usize {
        self.captured().count()
    }

    /// A run succeeds when at least one target was captured.
    pub fn succeeded(&self) -> bool {
        self.captured_count() > 0
    }
}

/// Captures one target into `{root}/{date}/{name}_{date}.png`.
pub async fn capture_target<P: Page + ?Sized>(
    page: &P,
    target: &Target,
    config: &AppConfig,
    date: &CaptureDate,
) -> Result<TargetOutcome, TargetError> {
    navigate::open_target(page, target, &config.navigation).await?;

    let height = locate::document_height(page)
        .await?
        .max(config.browser.height)
        .min(config.navigation.max_page_height);
    capture::expand_to_full_page(page, config.browser.width, height, &config.navigation).await?;
    let anchors = locate::locate(page, &config.locator, config.navigation.poll_interval()).await?;

    let screenshot = capture::screenshot(page).await?;
    let path = archive::date_dir(&config.archive_root, date).join(date.image_name(&target.name));
    let plan = capture::crop_and_save(&screenshot, &anchors, &config.geometry, &path)?;

    let degraded = anchors.end.is_fallback() || plan == CropPlan::FullImage;
    Ok(TargetOutcome::Captured { path, degraded, plan })
}

/// Captures every configured target with the same page, in catalog order.
pub async fn capture_all<P: Page + ?Sized>(
    page: &P,
    config: &AppConfig,
    date: &CaptureDate,
) -> Vec<TargetResult> {
    let total = config.targets.len();
    let mut results = Vec::with_capacity(total);

    for (i, target) in config.targets.iter().enumerate() {
        if i > 0 && config.navigation.between_targets_ms > 0 {
            sleep(Duration::from_millis(config.navigation.between_targets_ms)).await;
        }
        info!("[{}/{}] capturing {} ({})", i + 1, total, target.name, target.app_id);

        let outcome = match capture_target(page, target, config, date).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(target = %target.name, "capture failed: {}", e);
                TargetOutcome::Failed(e)
            }
        };
        if let TargetOutcome::Captured { degraded: true, .. } = outcome {
            warn!(target = %target.name, "captured with a fallback region");
        }
        results.push(TargetResult { name: target.name.clone(), outcome });
    }
    results
}

/// Captures all targets with `page` and patches the dashboard if anything
/// was captured.
pub async fn run_with_page<P: Page + ?Sized>(page: &P, config: &AppConfig, date: &CaptureDate) -> RunReport {
    let started = Instant::now();
    let results = capture_all(page, config, date).await;

    let mut report = RunReport { date: date.clone(), results, dashboard: None };
    info!(
        "captured {}/{} targets in {:.1}s",
        report.captured_count(),
        report.results.len(),
        started.elapsed().as_secs_f64()
    );

    if report.succeeded() {
        let captured: Vec<&Target> = config
            .targets
            .iter()
            .filter(|t| report.captured().any(|r| r.name == t.name))
            .collect();
        let patched = dashboard::update_dashboard(config, date, &captured);
        if let Err(e) = &patched {
            error!("dashboard update failed: {}", e);
        }
        report.dashboard = Some(patched);
    } else {
        warn!("no targets captured, dashboard left unchanged");
    }
    report
}

/// One full run against a real browser.
pub async fn run_once(config: &AppConfig, date: &CaptureDate) -> Result<RunReport, EnvironmentError> {
    info!(
        "saving captures to {}",
        archive::date_dir(&config.archive_root, date).display()
    );
    let page = driver::launch(&config.browser).await?;
    let report = run_with_page(&page, config, date).await;
    page.quit().await;
    Ok(report)
}

/// Patches the dashboard from images already on disk for `date`.
pub fn patch_from_disk(config: &AppConfig, date: &CaptureDate) -> Result<PatchReport, PatchError> {
    let names = archive::captured_names(
        &config.archive_root,
        date,
        config.targets.iter().map(|t| t.name.as_str()),
    );
    let captured: Vec<&Target> = config
        .targets
        .iter()
        .filter(|t| names.contains(&t.name.as_str()))
        .collect();
    info!("{} image(s) on disk for {}", captured.len(), date);
    dashboard::update_dashboard(config, date, &captured)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;

    use image::GenericImageView;

    use super::*;
    use crate::config::NavigationConfig;
    use crate::dashboard::patch;
    use crate::page::fixture::{FixturePage, FixtureSite};
    use crate::page::BoundingBox;

    const DASHBOARD: &str = r#"<html><body>
    <select id="dateSelect" onchange="showDateContent(this.value)">
        <option value="20250108" selected>2025-01-08</option>
    </select>
    <div class="content-area">
        <div class="date-content" id="content-20250108"></div>
    </div>
    <script>
        const availableDates = ['20250108'];
        showDateContent('20250108');
    </script>
</body></html>"#;

    fn test_config(root: &Path, targets: Vec<Target>) -> AppConfig {
        fs::write(root.join("aos_review.html"), DASHBOARD).unwrap();
        let mut config = AppConfig {
            archive_root: root.to_path_buf(),
            targets,
            navigation: NavigationConfig {
                ready_timeout_ms: 100,
                poll_interval_ms: 1,
                settle_ms: 0,
                between_targets_ms: 0,
                ..NavigationConfig::default()
            },
            ..AppConfig::default()
        };
        config.locator.start_timeout_ms = 0;
        config.dashboard.backup = false;
        config
    }

    fn site(config: &AppConfig, with_end: bool) -> FixtureSite {
        let mut elements = HashMap::new();
        elements.insert(config.locator.start[0].clone(), BoundingBox::new(400.0, 500.0, 300.0, 40.0));
        if with_end {
            elements.insert(config.locator.end[0].clone(), BoundingBox::new(400.0, 2100.0, 120.0, 40.0));
        }
        FixtureSite { elements, page_height: 3000, ..FixtureSite::default() }
    }

    fn date() -> CaptureDate {
        "20250115".parse().unwrap()
    }

    #[tokio::test]
    async fn test_two_targets_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let targets = vec![
            Target::new("com.example.one", "One", "하나"),
            Target::new("com.example.two", "Two", "둘"),
        ];
        let config = test_config(dir.path(), targets);
        fs::create_dir_all(dir.path().join("20250108")).unwrap();
        fs::write(dir.path().join("20250108/Two_20250108.png"), b"png").unwrap();
        let page = FixturePage::new(vec![
            ("com.example.one", site(&config, true)),
            ("com.example.two", site(&config, true)),
        ]);

        let report = run_with_page(&page, &config, &date()).await;
        assert!(report.succeeded());
        assert_eq!(report.captured_count(), 2);

        for name in ["One", "Two"] {
            let path = dir.path().join("20250115").join(format!("{}_20250115.png", name));
            assert_eq!(image::open(&path).unwrap().dimensions(), (1000, 1800));
        }

        let html = fs::read_to_string(dir.path().join("aos_review.html")).unwrap();
        assert_eq!(patch::option_values(&html), vec!["20250115", "20250108"]);
        assert_eq!(html.matches(r#"<option value="20250115""#).count(), 1);
        assert!(html.contains(r#"<img src="20250115/One_20250115.png""#));
        assert!(html.contains(r#"<img src="20250108/Two_20250108.png""#));
    }

    #[tokio::test]
    async fn test_missing_end_anchor_is_degraded_capture() {
        let dir = tempfile::tempdir().unwrap();
        let targets = vec![
            Target::new("com.example.one", "One", "하나"),
            Target::new("com.example.two", "Two", "둘"),
        ];
        let config = test_config(dir.path(), targets);
        let page = FixturePage::new(vec![
            ("com.example.one", site(&config, false)),
            ("com.example.two", site(&config, true)),
        ]);

        let report = run_with_page(&page, &config, &date()).await;
        assert_eq!(report.captured_count(), 2);
        let flags: Vec<bool> = report
            .results
            .iter()
            .map(|r| match &r.outcome {
                TargetOutcome::Captured { path, degraded, .. } => {
                    assert!(path.is_file(), "{} missing", path.display());
                    *degraded
                }
                other => panic!("expected a capture, got {:?}", other),
            })
            .collect();
        assert_eq!(flags, vec![true, false]);
    }

    #[tokio::test]
    async fn test_anchors_are_read_after_the_window_grows() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), vec![Target::new("com.example.one", "One", "하나")]);
        let mut reflowing = site(&config, true);
        reflowing
            .after_resize
            .insert(config.locator.start[0].clone(), BoundingBox::new(400.0, 900.0, 300.0, 40.0));
        let page = FixturePage::new(vec![("com.example.one", reflowing)]);

        let outcome = capture_target(&page, &config.targets[0], &config, &date()).await.unwrap();
        match outcome {
            TargetOutcome::Captured { plan: CropPlan::Region(r), .. } => {
                assert_eq!((r.top, r.bottom), (800, 2600));
            }
            other => panic!("expected a cropped capture, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_target_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let targets = vec![
            Target::new("com.example.broken", "Broken", "고장"),
            Target::new("com.example.two", "Two", "둘"),
        ];
        let config = test_config(dir.path(), targets);
        let page = FixturePage::new(vec![
            ("com.example.broken", FixtureSite { page_height: 3000, ..FixtureSite::default() }),
            ("com.example.two", site(&config, true)),
        ]);

        let report = run_with_page(&page, &config, &date()).await;
        assert!(matches!(
            report.results[0].outcome,
            TargetOutcome::Failed(TargetError::StartAnchorMissing { .. })
        ));
        assert_eq!(report.captured_count(), 1);
        assert!(matches!(report.dashboard, Some(Ok(_))));
    }

    #[tokio::test]
    async fn test_nothing_captured_leaves_dashboard_alone() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), vec![Target::new("com.example.broken", "Broken", "고장")]);
        let page = FixturePage::new(vec![]);

        let report = run_with_page(&page, &config, &date()).await;
        assert!(!report.succeeded());
        assert!(report.dashboard.is_none());
        let html = fs::read_to_string(dir.path().join("aos_review.html")).unwrap();
        assert_eq!(html, DASHBOARD);
    }

    #[test]
    fn test_patch_from_disk_uses_existing_images() {
        let dir = tempfile::tempdir().unwrap();
        let targets = vec![
            Target::new("com.example.one", "One", "하나"),
            Target::new("com.example.two", "Two", "둘"),
        ];
        let config = test_config(dir.path(), targets);
        fs::create_dir_all(dir.path().join("20250115")).unwrap();
        fs::write(dir.path().join("20250115/Two_20250115.png"), b"png").unwrap();

        let report = patch_from_disk(&config, &date()).unwrap();
        assert!(report.changed());
        let html = fs::read_to_string(dir.path().join("aos_review.html")).unwrap();
        assert!(html.contains("Two_20250115.png"));
        assert!(!html.contains("One_20250115.png"));
    }
}
