use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::time_utils::current_unix_timestamp_ms;

/// Writes `payload` as pretty JSON (trailing newline) through a sibling temp
/// file and a rename, so a crash never leaves a half-written store behind.
pub fn write_json_atomic<T: Serialize>(path: &Path, payload: &T) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("state file path cannot be empty");
    }
    if path.is_dir() {
        bail!("state file path '{}' is a directory", path.display());
    }
    let mut encoded = serde_json::to_vec_pretty(payload)
        .with_context(|| format!("failed to encode {}", path.display()))?;
    encoded.push(b'\n');

    let temp_path = temp_sibling(path);
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(&temp_path, &encoded)
        .with_context(|| format!("failed to write {}", temp_path.display()))?;
    if let Err(error) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(error).with_context(|| {
            format!(
                "failed to replace {} with {}",
                path.display(),
                temp_path.display()
            )
        });
    }
    Ok(())
}

/// Decodes a JSON state file; `Ok(None)` when it does not exist yet.
pub fn read_json_if_exists<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error).with_context(|| format!("failed to read {}", path.display())),
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .with_context(|| format!("failed to parse {}", path.display()))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or(OsStr::new("gitup-state")));
    name.push(format!(
        ".tmp-{}-{}",
        std::process::id(),
        current_unix_timestamp_ms()
    ));
    match path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}
