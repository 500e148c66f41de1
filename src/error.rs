//! Error kinds for a capture run.
//! Each stage of the run has its own type so the runner can apply a policy
//! per kind: environment errors abort the run, target errors skip one game,
//! patch and publish errors are logged and never change the capture result.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures talking to the browser through the `Page` seam.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("webdriver: {0}")]
    Driver(#[from] thirtyfour::prelude::WebDriverError),
    #[error("script returned unexpected value: {0}")]
    Script(String),
    #[error("invalid url '{url}': {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// The browser could not be brought up. Fatal for the whole run.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("webdriver server at {url} is unreachable: {source}")]
    ServerUnreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("webdriver server at {url} is not ready: {message}")]
    ServerNotReady { url: String, message: String },
    #[error("failed to open browser session: {0}")]
    Session(#[source] PageError),
}

/// One target could not be captured. The run continues with the next one.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("page error: {0}")]
    Page(#[from] PageError),
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: &'static str, waited: Duration },
    #[error("no start anchor matched ({tried} selectors tried)")]
    StartAnchorMissing { tried: usize },
    #[error("image encode/decode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The dashboard could not be read or written. Logged, not fatal.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("dashboard document not found: {0}")]
    DocumentMissing(PathBuf),
    #[error("dashboard i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Version-control publishing failed. Logged, not fatal.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}
