//! Daily runner.
//! `run_job` is one capture-patch-publish cycle with retries; `run_daily`
//! keeps the process alive and fires `run_job` once a day at the configured
//! local time until interrupted.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

use crate::archive::CaptureDate;
use crate::config::AppConfig;
use crate::pipeline::{self, RunReport};
use crate::publish::{self, PublishOutcome};

const STATUS_EVERY: Duration = Duration::from_secs(3600);

// *************** Trigger arithmetic ***************

/// Parses `HH:MM`.
pub fn parse_at(at: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(at.trim(), "%H:%M")
        .with_context(|| format!("Invalid trigger time '{}', expected HH:MM", at))
}

/// Whether the daily trigger should fire at `now`.
pub fn due(now: NaiveDateTime, at: NaiveTime, last_run: Option<NaiveDate>) -> bool {
    now.time() >= at && last_run != Some(now.date())
}

/// Next time the trigger fires after `now`, given the last run date.
pub fn next_run(now: NaiveDateTime, at: NaiveTime, last_run: Option<NaiveDate>) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if now.time() < at && last_run != Some(now.date()) {
        today
    } else if due(now, at, last_run) {
        now
    } else {
        today + chrono::Duration::days(1)
    }
}

fn format_wait(wait: chrono::Duration) -> String {
    let minutes = wait.num_minutes().max(0);
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}

// *************** Jobs ***************

/// Runs the capture stage, retrying environment failures and empty runs.
/// `max_retries` is the total number of attempts.
pub async fn run_with_retries(config: &AppConfig, date: &CaptureDate) -> Option<RunReport> {
    let attempts = config.schedule.max_retries.max(1);
    let delay = Duration::from_secs(config.schedule.retry_delay_secs);
    let mut last = None;

    for attempt in 1..=attempts {
        info!("capture attempt {}/{}", attempt, attempts);
        match pipeline::run_once(config, date).await {
            Ok(report) if report.succeeded() => return Some(report),
            Ok(report) => {
                warn!("attempt {} captured nothing", attempt);
                last = Some(report);
            }
            Err(e) => error!("attempt {} aborted: {}", attempt, e),
        }
        if attempt < attempts {
            info!("retrying in {}s", delay.as_secs());
            sleep(delay).await;
        }
    }
    error!("all {} capture attempts failed", attempts);
    last
}

/// Paths staged by a publish for `date`, relative to the archive root.
pub fn publish_paths(config: &AppConfig, date: &CaptureDate) -> Vec<PathBuf> {
    vec![config.dashboard.path.clone(), PathBuf::from(date.as_str())]
}

/// Publishes, logging rather than returning failures.
pub async fn publish_logged(config: &AppConfig, date: &CaptureDate) {
    let paths = publish_paths(config, date);
    match publish::publish(&config.publish, &config.archive_root, &paths).await {
        Ok(PublishOutcome::Pushed { message }) => info!("published: {}", message),
        Ok(PublishOutcome::NothingToCommit) => info!("nothing to publish"),
        Ok(PublishOutcome::Disabled) => info!("publishing disabled"),
        Err(e) => error!("publish failed: {}", e),
    }
}

/// One scheduled job: capture with retries, then publish regardless.
/// Returns whether any target was captured.
pub async fn run_job(config: &AppConfig, date: &CaptureDate) -> bool {
    let report = run_with_retries(config, date).await;
    publish_logged(config, date).await;
    report.is_some_and(|r| r.succeeded())
}

// *************** Daily loop ***************

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => warn!("SIGTERM handler unavailable: {}", e),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Ctrl-C handler failed: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Blocks until interrupted, running `run_job` once a day at `at`.
/// Starting after today's trigger time waits for tomorrow.
pub async fn run_daily(config: &AppConfig, at: &str) -> Result<()> {
    let at = parse_at(at)?;
    let poll = Duration::from_secs(config.schedule.poll_secs.max(1));

    let now = Local::now().naive_local();
    let mut last_run = (now.time() >= at).then(|| now.date());
    info!(
        "scheduler started, daily at {}, next run {}",
        at.format("%H:%M"),
        next_run(now, at, last_run).format("%Y-%m-%d %H:%M")
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut last_status = Instant::now();

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("scheduler stopped");
                return Ok(());
            }
            _ = sleep(poll) => {}
        }

        let now = Local::now().naive_local();
        if due(now, at, last_run) {
            last_run = Some(now.date());
            let date = CaptureDate::from_naive(now.date());
            info!("daily trigger fired for {}", date);
            let ok = run_job(config, &date).await;
            info!(
                "job for {} finished ({}), next run {}",
                date,
                if ok { "ok" } else { "failed" },
                next_run(Local::now().naive_local(), at, last_run).format("%Y-%m-%d %H:%M")
            );
            last_status = Instant::now();
        } else if last_status.elapsed() >= STATUS_EVERY {
            let next = next_run(now, at, last_run);
            info!("scheduler alive, next run in {}", format_wait(next - now));
            last_status = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn dt(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_at() {
        assert_eq!(parse_at("00:10").unwrap(), at(0, 10));
        assert_eq!(parse_at(" 23:59 ").unwrap(), at(23, 59));
        assert!(parse_at("24:00").is_err());
        assert!(parse_at("noon").is_err());
    }

    #[test]
    fn test_fires_once_per_day() {
        let trigger = at(0, 10);
        assert!(!due(dt(15, 0, 9), trigger, None));
        assert!(due(dt(15, 0, 10), trigger, None));
        assert!(due(dt(15, 13, 0), trigger, Some(NaiveDate::from_ymd_opt(2025, 1, 14).unwrap())));
        assert!(!due(dt(15, 13, 0), trigger, Some(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap())));
        assert!(due(dt(16, 0, 11), trigger, Some(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap())));
    }

    #[test]
    fn test_next_run() {
        let trigger = at(1, 0);
        let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert_eq!(next_run(dt(15, 0, 30), trigger, None), dt(15, 1, 0));
        assert_eq!(next_run(dt(15, 2, 0), trigger, Some(today)), dt(16, 1, 0));
        assert_eq!(next_run(dt(15, 2, 0), trigger, None), dt(15, 2, 0));
    }

    #[test]
    fn test_format_wait() {
        assert_eq!(format_wait(chrono::Duration::minutes(125)), "2h 05m");
        assert_eq!(format_wait(chrono::Duration::minutes(-3)), "0h 00m");
    }

    #[test]
    fn test_publish_paths_are_relative() {
        let config = AppConfig::default();
        let date: CaptureDate = "20250115".parse().unwrap();
        assert_eq!(
            publish_paths(&config, &date),
            vec![PathBuf::from("aos_review.html"), PathBuf::from("20250115")]
        );
    }
}
