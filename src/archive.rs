//! Date folders on disk.
//! A capture run is identified by its `YYYYMMDD` date; its images live in
//! `{root}/{date}/{name}_{date}.png`.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{Local, NaiveDate};

use crate::config::DateStyle;

/// A validated `YYYYMMDD` date. Lexicographic order is chronological order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureDate(String);

#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not a YYYYMMDD date")]
pub struct InvalidDate(pub String);

impl CaptureDate {
    pub fn today() -> Self {
        Self::from_naive(Local::now().date_naive())
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date.format("%Y%m%d").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `2025-01-15` or `2025년 01월 15일`.
    pub fn label(&self, style: DateStyle) -> String {
        let (y, m, d) = (&self.0[..4], &self.0[4..6], &self.0[6..8]);
        match style {
            DateStyle::Dashed => format!("{}-{}-{}", y, m, d),
            DateStyle::Korean => format!("{}년 {}월 {}일", y, m, d),
        }
    }

    pub fn image_name(&self, target_name: &str) -> String {
        format!("{}_{}.png", target_name, self.0)
    }

    /// Image path relative to the archive root, with forward slashes as used
    /// in the dashboard.
    pub fn image_href(&self, target_name: &str) -> String {
        format!("{}/{}", self.0, self.image_name(target_name))
    }
}

impl FromStr for CaptureDate {
    type Err = InvalidDate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 8
            && s.bytes().all(|b| b.is_ascii_digit())
            && NaiveDate::parse_from_str(s, "%Y%m%d").is_ok()
        {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidDate(s.to_string()))
        }
    }
}

impl fmt::Display for CaptureDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn date_dir(root: &Path, date: &CaptureDate) -> PathBuf {
    root.join(date.as_str())
}

/// All `YYYYMMDD` folders directly under `root`, ascending.
pub fn scan_date_folders(root: &Path) -> io::Result<Vec<CaptureDate>> {
    let mut dates = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(date) = entry.file_name().to_str().and_then(|n| n.parse().ok()) {
            dates.push(date);
        }
    }
    dates.sort();
    Ok(dates)
}

/// Largest date strictly before `current`, or `current` itself when there is
/// none.
pub fn previous_date<'a, I>(folders: I, current: &CaptureDate) -> CaptureDate
where
    I: IntoIterator<Item = &'a CaptureDate>,
{
    folders
        .into_iter()
        .filter(|d| *d < current)
        .max()
        .cloned()
        .unwrap_or_else(|| current.clone())
}

fn png_count(dir: &Path) -> io::Result<usize> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e.eq_ignore_ascii_case("png")) {
            total += 1;
        }
    }
    Ok(total)
}

/// Date folders holding at least one PNG, ascending. An empty folder left by
/// a failed run is not a capture date.
pub fn capture_folders(root: &Path) -> io::Result<Vec<CaptureDate>> {
    let mut dates = Vec::new();
    for date in scan_date_folders(root)? {
        if png_count(&date_dir(root, &date))? > 0 {
            dates.push(date);
        }
    }
    Ok(dates)
}

/// Number of PNG files across all date folders.
pub fn count_images(root: &Path) -> io::Result<usize> {
    let mut total = 0;
    for date in scan_date_folders(root)? {
        total += png_count(&date_dir(root, &date))?;
    }
    Ok(total)
}

/// Target names that already have an image for `date`.
pub fn captured_names<'a>(root: &Path, date: &CaptureDate, names: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let dir = date_dir(root, date);
    names
        .into_iter()
        .filter(|name| dir.join(date.image_name(name)).is_file())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> CaptureDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_rejects_malformed_dates() {
        assert!("20250115".parse::<CaptureDate>().is_ok());
        assert!("2025011".parse::<CaptureDate>().is_err());
        assert!("2025-01-15".parse::<CaptureDate>().is_err());
        assert!("20251301".parse::<CaptureDate>().is_err());
        assert!("backups0".parse::<CaptureDate>().is_err());
    }

    #[test]
    fn test_labels() {
        let d = date("20250115");
        assert_eq!(d.label(DateStyle::Dashed), "2025-01-15");
        assert_eq!(d.label(DateStyle::Korean), "2025년 01월 15일");
        assert_eq!(d.image_href("Poker"), "20250115/Poker_20250115.png");
    }

    #[test]
    fn test_previous_date_picks_largest_smaller() {
        let folders = [date("20250101"), date("20250110"), date("20250115")];
        assert_eq!(previous_date(&folders, &date("20250115")), date("20250110"));
    }

    #[test]
    fn test_previous_date_defaults_to_current() {
        let folders = [date("20250115"), date("20250120")];
        assert_eq!(previous_date(&folders, &date("20250115")), date("20250115"));
        assert_eq!(previous_date(&[], &date("20250115")), date("20250115"));
    }

    #[test]
    fn test_scan_ignores_files_and_non_date_dirs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["20250110", "20250101", "logs", "2025011"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("20250120"), b"not a dir").unwrap();

        let dates = scan_date_folders(dir.path()).unwrap();
        assert_eq!(dates, vec![date("20250101"), date("20250110")]);
    }

    #[test]
    fn test_capture_folders_skip_empty_dates() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["20250101", "20250108", "20250110"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("20250101/Poker_20250101.png"), b"").unwrap();
        fs::write(dir.path().join("20250110/notes.txt"), b"").unwrap();

        let folders = capture_folders(dir.path()).unwrap();
        assert_eq!(folders, vec![date("20250101")]);
        assert_eq!(previous_date(&folders, &date("20250115")), date("20250101"));
    }

    #[test]
    fn test_count_images_and_captured_names() {
        let dir = tempfile::tempdir().unwrap();
        let d = date("20250115");
        fs::create_dir(dir.path().join("20250115")).unwrap();
        fs::write(dir.path().join("20250115/Poker_20250115.png"), b"").unwrap();
        fs::write(dir.path().join("20250115/notes.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("20250110")).unwrap();
        fs::write(dir.path().join("20250110/Poker_20250110.png"), b"").unwrap();

        assert_eq!(count_images(dir.path()).unwrap(), 2);
        assert_eq!(captured_names(dir.path(), &d, ["Poker", "Sudda"]), vec!["Poker"]);
    }
}
