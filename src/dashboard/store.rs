//! Reading and writing the dashboard file.
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crash mid-write never leaves a truncated dashboard.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::error::PatchError;

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> PatchError + '_ {
    move |source| PatchError::Io { path: path.to_path_buf(), source }
}

pub fn read(path: &Path) -> Result<String, PatchError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(PatchError::DocumentMissing(path.to_path_buf())),
        Err(e) => Err(io_err(path)(e)),
    }
}

/// Copies `path` to `{dir}/{stem}_backup_{YYYYmmdd_HHMMSS}.{ext}`.
pub fn backup(path: &Path, dir: &Path) -> Result<PathBuf, PatchError> {
    fs::create_dir_all(dir).map_err(io_err(dir))?;
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("dashboard");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("html");
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let target = dir.join(format!("{}_backup_{}.{}", stem, stamp, ext));
    fs::copy(path, &target).map_err(io_err(&target))?;
    info!("dashboard backed up to {}", target.display());
    Ok(target)
}

/// Replaces `path` with `text` via a temporary file in the same directory.
pub fn write_atomic(path: &Path, text: &str) -> Result<(), PatchError> {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("dashboard");
    let tmp = path.with_file_name(format!(".{}.tmp", name));

    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(path)(e));
    }
    Ok(())
}
