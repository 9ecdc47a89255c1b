use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const LOG_ROTATION_MAX_BYTES_ENV: &str = "GITUP_LOG_ROTATION_MAX_BYTES";
pub const LOG_ROTATION_MAX_FILES_ENV: &str = "GITUP_LOG_ROTATION_MAX_FILES";
const DEFAULT_LOG_ROTATION_MAX_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_LOG_ROTATION_MAX_FILES: usize = 5;

/// Size limits for a [`RotatingJournal`]. `max_files` counts the active file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRotationPolicy {
    pub max_bytes: u64,
    pub max_files: usize,
}

impl Default for LogRotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_LOG_ROTATION_MAX_BYTES,
            max_files: DEFAULT_LOG_ROTATION_MAX_FILES,
        }
    }
}

impl LogRotationPolicy {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Zero, negative, or unparseable values keep the default for that limit.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn positive<T: std::str::FromStr + PartialOrd + Default>(raw: Option<String>) -> Option<T> {
            raw?.trim().parse::<T>().ok().filter(|value| *value > T::default())
        }
        let defaults = Self::default();
        Self {
            max_bytes: positive(lookup(LOG_ROTATION_MAX_BYTES_ENV)).unwrap_or(defaults.max_bytes),
            max_files: positive(lookup(LOG_ROTATION_MAX_FILES_ENV)).unwrap_or(defaults.max_files),
        }
    }

    pub fn is_enabled(self) -> bool {
        self.max_bytes > 0 && self.max_files > 0
    }

    fn backup_slots(self) -> usize {
        self.max_files.saturating_sub(1)
    }
}

/// Append-only NDJSON file with numbered backups (`<path>.1` is the newest).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatingJournal {
    path: PathBuf,
    policy: LogRotationPolicy,
}

impl RotatingJournal {
    pub fn new(path: impl Into<PathBuf>, policy: LogRotationPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> LogRotationPolicy {
        self.policy
    }

    pub fn backup_path(&self, index: usize) -> PathBuf {
        let mut raw = self.path.clone().into_os_string();
        raw.push(format!(".{index}"));
        PathBuf::from(raw)
    }

    /// Appends `line` plus a newline, rotating first if the active file would
    /// grow past `max_bytes`.
    pub fn append(&self, line: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        if self.would_overflow(line)? {
            self.rotate()?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        writeln!(file, "{line}")
            .and_then(|()| file.flush())
            .with_context(|| format!("failed to append to {}", self.path.display()))
    }

    /// Non-empty lines of the active file only; backups are not read.
    pub fn read_lines(&self) -> Result<Vec<String>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => {
                return Err(error).with_context(|| format!("failed to open {}", self.path.display()))
            }
        };
        std::io::BufReader::new(file)
            .lines()
            .filter(|line| !matches!(line, Ok(text) if text.trim().is_empty()))
            .collect::<std::io::Result<Vec<_>>>()
            .with_context(|| format!("failed to read {}", self.path.display()))
    }

    fn would_overflow(&self, line: &str) -> Result<bool> {
        if !self.policy.is_enabled() {
            return Ok(false);
        }
        let current = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata.len(),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(error) => {
                return Err(error).with_context(|| format!("failed to stat {}", self.path.display()))
            }
        };
        let incoming = u64::try_from(line.len() + 1).unwrap_or(u64::MAX);
        Ok(current.saturating_add(incoming) > self.policy.max_bytes)
    }

    fn rotate(&self) -> Result<()> {
        let slots = self.policy.backup_slots();
        if slots == 0 {
            return std::fs::remove_file(&self.path)
                .with_context(|| format!("failed to truncate {}", self.path.display()));
        }

        let oldest = self.backup_path(slots);
        if oldest.exists() {
            std::fs::remove_file(&oldest)
                .with_context(|| format!("failed to drop {}", oldest.display()))?;
        }
        for index in (1..slots).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                rename(&from, &self.backup_path(index + 1))?;
            }
        }
        rename(&self.path, &self.backup_path(1))
    }
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    std::fs::rename(from, to)
        .with_context(|| format!("failed to rotate {} to {}", from.display(), to.display()))
}
