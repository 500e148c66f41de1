//! Read-only consistency check of the dashboard.
//! Parses the document and reports places where the selector, the date
//! sections, the script constants and the archive on disk disagree.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use scraper::{Html, Selector};

use super::patch;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuditIssue {
    /// Listed in the selector but has no `content-{date}` section.
    OptionWithoutSection(String),
    /// Has a section but is not listed in the selector.
    SectionWithoutOption(String),
    /// `availableDates` and the selector list different dates.
    AvailableDatesMismatch { missing: Vec<String>, extra: Vec<String> },
    /// `availableDates` is absent.
    AvailableDatesMissing,
    /// The page opens on a date other than the selected option.
    DefaultDateMismatch { default: String, selected: Option<String> },
    /// An `img.capture-image` source that is not on disk.
    MissingImage(String),
}

impl fmt::Display for AuditIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditIssue::OptionWithoutSection(d) => write!(f, "option {} has no content section", d),
            AuditIssue::SectionWithoutOption(d) => write!(f, "section content-{} is not in the date selector", d),
            AuditIssue::AvailableDatesMismatch { missing, extra } => write!(
                f,
                "availableDates disagrees with the selector (missing: {:?}, extra: {:?})",
                missing, extra
            ),
            AuditIssue::AvailableDatesMissing => write!(f, "availableDates constant not found"),
            AuditIssue::DefaultDateMismatch { default, selected } => write!(
                f,
                "page opens on {} but the selected option is {}",
                default,
                selected.as_deref().unwrap_or("none")
            ),
            AuditIssue::MissingImage(src) => write!(f, "image {} does not exist", src),
        }
    }
}

struct Selectors {
    option: Selector,
    selected: Selector,
    section: Selector,
    image: Selector,
}

impl Selectors {
    fn new() -> Self {
        Self {
            option: Selector::parse("select#dateSelect option").unwrap(),
            selected: Selector::parse("select#dateSelect option[selected]").unwrap(),
            section: Selector::parse("div.date-content").unwrap(),
            image: Selector::parse("img.capture-image").unwrap(),
        }
    }
}

/// Checks `html` against itself and against the images under `root`.
pub fn audit(html: &str, root: &Path) -> Vec<AuditIssue> {
    let doc = Html::parse_document(html);
    let sel = Selectors::new();
    let mut issues = Vec::new();

    let options: BTreeSet<String> = doc
        .select(&sel.option)
        .filter_map(|o| o.value().attr("value"))
        .map(str::to_string)
        .collect();
    let sections: BTreeSet<String> = doc
        .select(&sel.section)
        .filter_map(|s| s.value().id())
        .filter_map(|id| id.strip_prefix("content-"))
        .map(str::to_string)
        .collect();

    for date in options.difference(&sections) {
        issues.push(AuditIssue::OptionWithoutSection(date.clone()));
    }
    for date in sections.difference(&options) {
        issues.push(AuditIssue::SectionWithoutOption(date.clone()));
    }

    match patch::available_dates(html) {
        Some(listed) => {
            let listed: BTreeSet<String> = listed.into_iter().collect();
            let missing: Vec<String> = options.difference(&listed).cloned().collect();
            let extra: Vec<String> = listed.difference(&options).cloned().collect();
            if !missing.is_empty() || !extra.is_empty() {
                issues.push(AuditIssue::AvailableDatesMismatch { missing, extra });
            }
        }
        None => issues.push(AuditIssue::AvailableDatesMissing),
    }

    let selected = doc
        .select(&sel.selected)
        .find_map(|o| o.value().attr("value"))
        .map(str::to_string);
    for default in patch::default_dates(html) {
        if selected.as_deref() != Some(default.as_str()) {
            issues.push(AuditIssue::DefaultDateMismatch { default, selected: selected.clone() });
        }
    }

    let mut seen = BTreeSet::new();
    for img in doc.select(&sel.image) {
        let Some(src) = img.value().attr("src") else { continue };
        if seen.insert(src.to_string()) && !root.join(src).is_file() {
            issues.push(AuditIssue::MissingImage(src.to_string()));
        }
    }

    issues
}
