//! Windows Task Scheduler registration.
//! Registers `review-capture run` as a daily task through `schtasks`, so the
//! one-shot mode can be used without keeping `schedule` running.
//! The task passes the config by absolute path; the archive root and `logs/`
//! resolve against that file's directory, so the task's working directory
//! (usually `System32`) does not matter.

use std::path::Path;

use anyhow::{bail, Context, Result};
use dialoguer::Confirm;
use tokio::process::Command;
use tracing::{info, warn};

/// Command line the task runs.
pub fn task_command(exe: &Path, config_path: &Path) -> String {
    format!("\"{}\" --config \"{}\" run", exe.display(), config_path.display())
}

pub fn create_args(name: &str, command: &str, at: &str) -> Vec<String> {
    ["/create", "/tn", name, "/tr", command, "/sc", "daily", "/st", at, "/f"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn delete_args(name: &str) -> Vec<String> {
    ["/delete", "/tn", name, "/f"].iter().map(|s| s.to_string()).collect()
}

pub fn query_args(name: &str) -> Vec<String> {
    ["/query", "/tn", name, "/fo", "list", "/v"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

async fn schtasks(args: &[String]) -> Result<std::process::Output> {
    Command::new("schtasks")
        .args(args)
        .output()
        .await
        .context("Failed to run schtasks (Windows only)")
}

/// Replaces any task called `name` with a daily trigger at `at`.
pub async fn install(name: &str, at: &str, config_path: &Path, assume_yes: bool) -> Result<()> {
    crate::schedule::parse_at(at)?;
    let exe = std::env::current_exe().context("Failed to resolve the current executable")?;
    let config_path = std::path::absolute(config_path)
        .with_context(|| format!("Failed to resolve {}", config_path.display()))?;
    let command = task_command(&exe, &config_path);

    println!("Task:     {}", name);
    println!("Runs:     {}", command);
    println!("Schedule: daily at {}", at);
    if !assume_yes {
        let proceed = Confirm::new()
            .with_prompt("Register this task?")
            .default(true)
            .interact()?;
        if !proceed {
            info!("task registration cancelled");
            return Ok(());
        }
    }

    let deleted = schtasks(&delete_args(name)).await?;
    if deleted.status.success() {
        info!("removed existing task {}", name);
    }

    let created = schtasks(&create_args(name, &command, at)).await?;
    if !created.status.success() {
        bail!(
            "schtasks /create failed: {}",
            String::from_utf8_lossy(&created.stderr).trim()
        );
    }
    info!("task {} registered, daily at {}", name, at);
    Ok(())
}

pub async fn query(name: &str) -> Result<()> {
    let out = schtasks(&query_args(name)).await?;
    if !out.status.success() {
        bail!("task {} not found: {}", name, String::from_utf8_lossy(&out.stderr).trim());
    }
    print!("{}", String::from_utf8_lossy(&out.stdout));
    Ok(())
}

pub async fn remove(name: &str) -> Result<()> {
    let out = schtasks(&delete_args(name)).await?;
    if !out.status.success() {
        warn!("schtasks /delete: {}", String::from_utf8_lossy(&out.stderr).trim());
        bail!("Failed to remove task {}", name);
    }
    info!("task {} removed", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_args() {
        let args = create_args("AOS_Review_Auto_Capture", "\"rc.exe\" run", "00:10");
        assert_eq!(
            args,
            vec!["/create", "/tn", "AOS_Review_Auto_Capture", "/tr", "\"rc.exe\" run", "/sc", "daily", "/st", "00:10", "/f"]
        );
    }

    #[test]
    fn test_delete_and_query_args() {
        assert_eq!(delete_args("T"), vec!["/delete", "/tn", "T", "/f"]);
        assert_eq!(query_args("T"), vec!["/query", "/tn", "T", "/fo", "list", "/v"]);
    }

    #[test]
    fn test_task_command_quotes_paths() {
        let cmd = task_command(Path::new("C:/tools/review capture.exe"), Path::new("D:/aos review/capture.json"));
        assert_eq!(cmd, "\"C:/tools/review capture.exe\" --config \"D:/aos review/capture.json\" run");
    }

    #[test]
    fn test_task_paths_do_not_depend_on_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("capture.json");
        std::fs::write(&config_path, r#"{"archive_root": "aos"}"#).unwrap();

        let config = crate::config::AppConfig::load(&config_path).unwrap();
        assert_eq!(config.archive_root, dir.path().join("aos"));
        assert!(config.dashboard_path().is_absolute());
        assert!(crate::config::base_dir(&config_path).join("logs").is_absolute());
    }

    #[tokio::test]
    async fn test_invalid_time_is_rejected_before_anything_runs() {
        let err = install("T", "25:99", Path::new("capture.json"), true).await.unwrap_err();
        assert!(err.to_string().contains("Invalid trigger time"));
    }
}
