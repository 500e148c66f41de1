mod archive;
mod capture;
mod catalog;
mod config;
mod dashboard;
mod driver;
mod error;
mod locate;
mod logging;
mod navigate;
mod page;
mod pipeline;
mod publish;
mod schedule;
mod task;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::{error, info, warn};

use crate::archive::CaptureDate;
use crate::config::AppConfig;
use crate::pipeline::TargetOutcome;

fn cli() -> Command {
    let date_arg = Arg::new("date")
        .long("date")
        .value_name("YYYYMMDD")
        .help("Capture date (defaults to today)")
        .value_parser(clap::value_parser!(CaptureDate));
    let at_arg = Arg::new("at")
        .long("at")
        .value_name("HH:MM")
        .help("Daily trigger time, local (defaults to schedule.at in the config)");

    Command::new("review-capture")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Captures store review sections and keeps the review dashboard up to date")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .help("Config file")
                .default_value("capture.json")
                .global(true),
        )
        .subcommand(
            Command::new("run")
                .about("Capture all targets once, patch the dashboard and publish")
                .arg(date_arg.clone())
                .arg(
                    Arg::new("delay-minutes")
                        .long("delay-minutes")
                        .value_name("MIN")
                        .help("Wait this long before starting")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("0"),
                )
                .arg(
                    Arg::new("no-publish")
                        .long("no-publish")
                        .help("Skip git commit/push")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("schedule")
                .about("Stay running and capture once a day")
                .arg(at_arg.clone()),
        )
        .subcommand(
            Command::new("patch")
                .about("Patch the dashboard from images already on disk")
                .arg(date_arg.required(true)),
        )
        .subcommand(Command::new("audit").about("Check the dashboard for drift"))
        .subcommand(
            Command::new("install-task")
                .about("Register a daily Windows scheduled task running `run`")
                .arg(at_arg)
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .short('y')
                        .help("Do not ask for confirmation")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("query")
                        .long("query")
                        .help("Show the registered task instead")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("remove"),
                )
                .arg(
                    Arg::new("remove")
                        .long("remove")
                        .help("Remove the registered task instead")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("init-config")
                .about("Write the default config file")
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help("Overwrite an existing file")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn exit(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn date_or_today(matches: &ArgMatches) -> CaptureDate {
    matches
        .get_one::<CaptureDate>("date")
        .cloned()
        .unwrap_or_else(CaptureDate::today)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();
    let config_path = PathBuf::from(
        matches
            .get_one::<String>("config")
            .map(String::as_str)
            .unwrap_or("capture.json"),
    );
    let _guard = logging::init(&config::base_dir(&config_path).join("logs"))
        .context("Failed to initialize logging")?;

    match matches.subcommand() {
        Some(("init-config", sub)) => {
            if config_path.exists() && !sub.get_flag("force") {
                bail!("{} already exists (use --force to overwrite)", config_path.display());
            }
            AppConfig::default().save(&config_path)?;
            info!("wrote default config to {}", config_path.display());
            Ok(ExitCode::SUCCESS)
        }
        Some((name, sub)) => {
            let config = AppConfig::load(&config_path)?;
            dispatch(name, sub, &config, &config_path).await
        }
        None => unreachable!("subcommand_required is set"),
    }
}

async fn dispatch(name: &str, sub: &ArgMatches, config: &AppConfig, config_path: &Path) -> Result<ExitCode> {
    match name {
        "run" => {
            let date = date_or_today(sub);
            let delay = sub.get_one::<u64>("delay-minutes").copied().unwrap_or(0);
            if delay > 0 {
                info!("waiting {} minute(s) before starting", delay);
                tokio::time::sleep(Duration::from_secs(delay * 60)).await;
            }

            info!("review capture run for {}", date);
            let report = schedule::run_with_retries(config, &date).await;
            if sub.get_flag("no-publish") {
                info!("publishing skipped");
            } else {
                schedule::publish_logged(config, &date).await;
            }

            let ok = report.as_ref().is_some_and(|r| r.succeeded());
            match &report {
                Some(r) => {
                    for result in &r.results {
                        match &result.outcome {
                            TargetOutcome::Captured { path, degraded: false, .. } => {
                                info!("  ok        {} -> {}", result.name, path.display())
                            }
                            TargetOutcome::Captured { path, degraded: true, plan } => {
                                warn!("  degraded  {} -> {} ({:?})", result.name, path.display(), plan)
                            }
                            TargetOutcome::Failed(e) => error!("  failed    {}: {}", result.name, e),
                        }
                    }
                    info!("{}: {}/{} targets captured", r.date, r.captured_count(), r.results.len());
                    match &r.dashboard {
                        Some(Ok(patch)) if patch.changed() => info!("dashboard updated"),
                        Some(Ok(_)) => info!("dashboard unchanged"),
                        Some(Err(_)) | None => warn!("dashboard not updated"),
                    }
                }
                None => error!("no capture attempt reached the browser"),
            }
            Ok(exit(ok))
        }
        "schedule" => {
            let at = sub
                .get_one::<String>("at")
                .cloned()
                .unwrap_or_else(|| config.schedule.at.clone());
            schedule::run_daily(config, &at).await?;
            Ok(ExitCode::SUCCESS)
        }
        "patch" => {
            let date = date_or_today(sub);
            match pipeline::patch_from_disk(config, &date) {
                Ok(report) => {
                    for (step, outcome) in &report.steps {
                        info!("{}: {:?}", step, outcome);
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    error!("dashboard patch failed: {}", e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        "audit" => {
            let path = config.dashboard_path();
            let html = dashboard::store::read(&path)?;
            let issues = dashboard::audit::audit(&html, &config.archive_root);
            if issues.is_empty() {
                info!("{}: no issues", path.display());
            }
            for issue in &issues {
                warn!("{}", issue);
            }
            Ok(exit(issues.is_empty()))
        }
        "install-task" => {
            let task_name = &config.schedule.task_name;
            if sub.get_flag("query") {
                task::query(task_name).await?;
            } else if sub.get_flag("remove") {
                task::remove(task_name).await?;
            } else {
                let at = sub
                    .get_one::<String>("at")
                    .cloned()
                    .unwrap_or_else(|| config.schedule.at.clone());
                task::install(task_name, &at, config_path, sub.get_flag("yes")).await?;
            }
            Ok(ExitCode::SUCCESS)
        }
        other => bail!("unknown command {}", other),
    }
}
