//! Publishing through git.
//! Stages the dashboard and the new date folder, commits with a timestamped
//! message and pushes. A clean tree is not an error.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::PublishConfig;
use crate::error::PublishError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    Pushed { message: String },
    NothingToCommit,
    Disabled,
}

pub fn commit_message(prefix: &str, now: DateTime<Local>) -> String {
    format!("{}: {}", prefix, now.format("%Y-%m-%d %H:%M:%S"))
}

fn is_nothing_to_commit(output: &str) -> bool {
    output.contains("nothing to commit") || output.contains("no changes added to commit")
}

struct GitOutput {
    success: bool,
    status: std::process::ExitStatus,
    stdout: String,
    stderr: String,
}

async fn git(repo: &Path, args: &[&str]) -> Result<GitOutput, PublishError> {
    let command = format!("git {}", args.join(" "));
    debug!("running `{}` in {}", command, repo.display());
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .await
        .map_err(|source| PublishError::Spawn { command, source })?;
    Ok(GitOutput {
        success: output.status.success(),
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

async fn git_checked(repo: &Path, args: &[&str]) -> Result<GitOutput, PublishError> {
    let out = git(repo, args).await?;
    if !out.success {
        return Err(PublishError::Command {
            command: format!("git {}", args.join(" ")),
            status: out.status,
            stderr: out.stderr.trim().to_string(),
        });
    }
    Ok(out)
}

/// Stages `paths` (relative to `repo`), commits and pushes.
/// Paths that do not exist are skipped.
pub async fn publish(
    config: &PublishConfig,
    repo: &Path,
    paths: &[PathBuf],
) -> Result<PublishOutcome, PublishError> {
    if !config.enabled {
        return Ok(PublishOutcome::Disabled);
    }

    let status = git_checked(repo, &["status", "--porcelain"]).await?;
    if status.stdout.trim().is_empty() {
        info!("no changes to publish");
        return Ok(PublishOutcome::NothingToCommit);
    }

    let existing: Vec<String> = paths
        .iter()
        .filter(|p| repo.join(p).exists())
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    if existing.is_empty() {
        info!("nothing to stage");
        return Ok(PublishOutcome::NothingToCommit);
    }
    let mut add = vec!["add", "--"];
    add.extend(existing.iter().map(String::as_str));
    git_checked(repo, &add).await?;

    let message = commit_message(&config.commit_prefix, Local::now());
    let commit = git(repo, &["commit", "-m", &message]).await?;
    if !commit.success {
        if is_nothing_to_commit(&commit.stdout) || is_nothing_to_commit(&commit.stderr) {
            info!("staged paths unchanged, nothing to commit");
            return Ok(PublishOutcome::NothingToCommit);
        }
        return Err(PublishError::Command {
            command: "git commit".to_string(),
            status: commit.status,
            stderr: commit.stderr.trim().to_string(),
        });
    }

    git_checked(repo, &["push", &config.remote, &config.branch]).await?;
    info!("pushed \"{}\" to {}/{}", message, config.remote, config.branch);
    Ok(PublishOutcome::Pushed { message })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_commit_message_format() {
        let now = Local.with_ymd_and_hms(2025, 1, 15, 0, 10, 5).unwrap();
        assert_eq!(commit_message("Auto update", now), "Auto update: 2025-01-15 00:10:05");
    }

    #[test]
    fn test_nothing_to_commit_detection() {
        assert!(is_nothing_to_commit("On branch main\nnothing to commit, working tree clean\n"));
        assert!(!is_nothing_to_commit("[main 1a2b3c4] Auto update: 2025-01-15 00:10:05"));
    }

    #[tokio::test]
    async fn test_disabled_publish_does_nothing() {
        let config = PublishConfig { enabled: false, ..PublishConfig::default() };
        let dir = tempfile::tempdir().unwrap();
        let outcome = publish(&config, dir.path(), &[]).await.unwrap();
        assert_eq!(outcome, PublishOutcome::Disabled);
    }

    #[tokio::test]
    async fn test_outside_a_repository_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = publish(&PublishConfig::default(), dir.path(), &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[ignore = "requires git on PATH"]
    async fn test_clean_repository_has_nothing_to_commit() {
        let dir = tempfile::tempdir().unwrap();
        git_checked(dir.path(), &["init", "-q"]).await.unwrap();
        let outcome = publish(&PublishConfig::default(), dir.path(), &[]).await.unwrap();
        assert_eq!(outcome, PublishOutcome::NothingToCommit);

        fs::write(dir.path().join("untracked.txt"), "x").unwrap();
        let outcome = publish(&PublishConfig::default(), dir.path(), &[PathBuf::from("missing")])
            .await
            .unwrap();
        assert_eq!(outcome, PublishOutcome::NothingToCommit);
    }
}
