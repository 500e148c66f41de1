//! Dashboard patcher.
//! Brings the review dashboard up to date with a capture date: selector
//! option, `availableDates`, the default date, the stat counters and the
//! comparison section. The document is read once, patched in memory and
//! written back only if something changed.

pub mod audit;
pub mod patch;
pub mod section;
pub mod store;

use std::fmt;

use tracing::{info, warn};

use crate::archive::{self, CaptureDate};
use crate::catalog::{BusinessUnit, Target};
use crate::config::{AppConfig, DashboardConfig};
use crate::error::PatchError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    AlreadyPresent,
    /// The markup this step edits was not found; the document is unchanged.
    AnchorMissing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchStep {
    DateOption,
    AvailableDates,
    DefaultDate,
    ComparisonSection,
    CaptureDays,
    TotalImages,
    Latest,
}

impl fmt::Display for PatchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PatchStep::DateOption => "date option",
            PatchStep::AvailableDates => "availableDates",
            PatchStep::DefaultDate => "default date",
            PatchStep::ComparisonSection => "comparison section",
            PatchStep::CaptureDays => "capture-days stat",
            PatchStep::TotalImages => "total-images stat",
            PatchStep::Latest => "latest-date stat",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub steps: Vec<(PatchStep, PatchOutcome)>,
}

impl PatchReport {
    pub fn changed(&self) -> bool {
        self.steps.iter().any(|(_, o)| *o == PatchOutcome::Applied)
    }

    #[cfg(test)]
    pub fn outcome(&self, step: PatchStep) -> Option<PatchOutcome> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, o)| *o)
    }

    fn record(&mut self, step: PatchStep, outcome: PatchOutcome) {
        if outcome == PatchOutcome::AnchorMissing {
            warn!("dashboard {}: anchor not found, left unchanged", step);
        }
        self.steps.push((step, outcome));
    }
}

/// What a patch needs to know about the archive.
pub struct DashboardUpdate<'a> {
    pub date: &'a CaptureDate,
    pub previous: &'a CaptureDate,
    pub captured: &'a [&'a Target],
    pub total_images: usize,
}

/// Applies every step to `html` in memory.
pub fn apply(
    html: &str,
    update: &DashboardUpdate<'_>,
    config: &DashboardConfig,
    units: &[BusinessUnit],
) -> (String, PatchReport) {
    let date = update.date.as_str();
    let mut report = PatchReport::default();

    let (html, o) = patch::insert_date_option(html, date, &update.date.label(config.date_style));
    report.record(PatchStep::DateOption, o);
    let (html, o) = patch::update_available_dates(&html, date);
    report.record(PatchStep::AvailableDates, o);
    let (html, o) = patch::update_default_date(&html, date);
    report.record(PatchStep::DefaultDate, o);

    let html = if config.comparison_sections {
        let (html, o) = patch::insert_comparison_section(&html, date, |indent| {
            let style = config.date_style;
            section::render_section(update.date, update.previous, update.captured, units, style, indent)
        });
        report.record(PatchStep::ComparisonSection, o);
        html
    } else {
        html
    };

    let dates = patch::option_values(&html);
    let labels = &config.stat_labels;
    let (html, o) = patch::update_stat(&html, &labels.capture_days, &dates.len().to_string());
    report.record(PatchStep::CaptureDays, o);
    let (html, o) = patch::update_stat(&html, &labels.total_images, &update.total_images.to_string());
    report.record(PatchStep::TotalImages, o);

    let latest = dates
        .iter()
        .filter_map(|d| d.parse::<CaptureDate>().ok())
        .max()
        .map(|d| d.label(config.date_style));
    let html = match latest {
        Some(latest) => {
            let (html, o) = patch::update_stat(&html, &labels.latest, &latest);
            report.record(PatchStep::Latest, o);
            html
        }
        None => html,
    };

    (html, report)
}

/// Patches the configured dashboard for `date` with the targets captured on
/// that date. Backs the document up first when it is about to change.
pub fn update_dashboard(
    config: &AppConfig,
    date: &CaptureDate,
    captured: &[&Target],
) -> Result<PatchReport, PatchError> {
    let path = config.dashboard_path();
    let root = &config.archive_root;
    let html = store::read(&path)?;

    let io = |source| PatchError::Io { path: root.clone(), source };
    let folders = archive::capture_folders(root).map_err(io)?;
    let previous = archive::previous_date(&folders, date);
    let total_images = archive::count_images(root).map_err(io)?;

    let update = DashboardUpdate { date, previous: &previous, captured, total_images };
    let (patched, report) = apply(&html, &update, &config.dashboard, &config.business_units);

    if !report.changed() {
        info!("dashboard already up to date for {}", date);
        return Ok(report);
    }
    if config.dashboard.backup {
        store::backup(&path, &root.join(&config.dashboard.backup_dir))?;
    }
    store::write_atomic(&path, &patched)?;
    info!(
        "dashboard updated for {} (previous {}, {} image(s) total)",
        date, previous, total_images
    );
    Ok(report)
}
