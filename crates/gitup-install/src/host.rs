//! Host collaborator boundary for install transactions: the activation
//! registry and the directory move primitive.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationScope {
    Site,
    Network,
}

impl ActivationScope {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivationScope::Site => "site",
            ActivationScope::Network => "network",
        }
    }
}

impl std::fmt::Display for ActivationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("component '{0}' is not installed")]
    NotInstalled(String),
    #[error("activation store error: {0}")]
    Store(String),
}

/// Live activation state owned by the host.
pub trait ActivationRegistry {
    fn is_active(&self, identifier: &str) -> bool;
    fn is_active_network_wide(&self, identifier: &str) -> bool;
    fn activate(&self, identifier: &str, scope: ActivationScope) -> Result<(), ActivationError>;

    /// Scope the component is currently active in, if any.
    fn active_scope(&self, identifier: &str) -> Option<ActivationScope> {
        if !self.is_active(identifier) {
            return None;
        }
        if self.is_active_network_wide(identifier) {
            Some(ActivationScope::Network)
        } else {
            Some(ActivationScope::Site)
        }
    }
}

/// Whole-tree directory move.
pub trait DirectoryMover {
    fn move_dir(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Filesystem mover: replaces an existing destination, renames, and falls
/// back to copy + remove when a rename cannot cross filesystems.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMover;

/// Resolves symlinks and `..` hops through the deepest existing ancestor;
/// the missing tail is appended unchanged.
pub fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = std::fs::canonicalize(path) {
        return resolved;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            resolve_path(parent).join(name)
        }
        _ => path.to_path_buf(),
    }
}

/// Whether two spellings name the same location on disk.
pub fn same_location(left: &Path, right: &Path) -> bool {
    resolve_path(left)
        .components()
        .eq(resolve_path(right).components())
}

impl DirectoryMover for FsMover {
    fn move_dir(&self, from: &Path, to: &Path) -> io::Result<()> {
        let (source, target) = (resolve_path(from), resolve_path(to));
        // Removing an alias of the source would destroy it before the rename.
        if source.components().eq(target.components()) {
            return Ok(());
        }
        if !from.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("source directory {} does not exist", from.display()),
            ));
        }
        if source.starts_with(&target) || target.starts_with(&source) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "cannot move {} into overlapping path {}",
                    from.display(),
                    to.display()
                ),
            ));
        }
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if to.is_dir() {
            std::fs::remove_dir_all(to)?;
        } else if to.exists() {
            std::fs::remove_file(to)?;
        }

        match std::fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(error) => {
                tracing::debug!(
                    from = %from.display(),
                    to = %to.display(),
                    "rename failed ({error}); copying instead"
                );
                copy_dir_recursive(from, to)?;
                std::fs::remove_dir_all(from)
            }
        }
    }
}

fn copy_dir_recursive(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
