//! Write-then-rename helpers.
//!
//! Every file the pipeline publishes (variants, sidecars, the manifest, plans
//! and reports) is first written to a hidden temporary name in the destination
//! directory and then renamed over the final path. A rename within one
//! directory is atomic, so an interrupted run never leaves a truncated file
//! under a name the generator's existence check would accept.
//!
//! Temporary names start with a dot, so the asset index and the generator's
//! source walk (both skip hidden entries) never pick them up.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Hidden sibling of `path` used as the staging file: `dir/.name.<pid>.tmp`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_name = format!(".{}.{}.tmp", name, std::process::id());
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}

/// Move a finished staging file into place, removing it if the rename fails.
pub fn publish(temp: &Path, path: &Path) -> io::Result<()> {
    fs::rename(temp, path).inspect_err(|_| {
        let _ = fs::remove_file(temp);
    })
}

/// Write `contents` to `path` atomically, creating parent directories.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let temp = temp_path_for(path);
    if let Err(e) = fs::write(&temp, contents) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }
    publish(&temp, path)
}

/// Serialize `value` as pretty JSON (with trailing newline) and write it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let mut json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    json.push('\n');
    write_atomic(path, json.as_bytes())
}
