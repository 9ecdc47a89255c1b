//! Post-install relocation: moves an extracted package into its canonical
//! directory and restores pre-upgrade plugin activation.

use std::io;
use std::path::{Path, PathBuf};

use gitup_update::{canonical_slug, SourceKind};
use thiserror::Error;

use crate::host::{
    same_location, ActivationError, ActivationRegistry, ActivationScope, DirectoryMover,
};
use crate::transaction::InstallTransaction;

/// Failure reported by the host's extract step; passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InstallFailure(pub String);

/// Where the host's extract step left the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPackage {
    pub destination: PathBuf,
}

pub type InstallResult = Result<ExtractedPackage, InstallFailure>;

#[derive(Debug, Error)]
pub enum RelocateError {
    #[error("install step failed: {0}")]
    Install(InstallFailure),
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    #[error("installed to {} but failed to reactivate '{identifier}': {source}", destination.display())]
    Activation {
        identifier: String,
        destination: PathBuf,
        source: ActivationError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationOutcome {
    pub destination: PathBuf,
    pub moved: bool,
    pub reactivated: Option<ActivationScope>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRoots {
    pub plugins_root: PathBuf,
    pub themes_root: PathBuf,
}

impl InstallRoots {
    pub fn root_for(&self, kind: SourceKind) -> &Path {
        match kind {
            SourceKind::Plugin => &self.plugins_root,
            SourceKind::Theme => &self.themes_root,
        }
    }

    pub fn canonical_dir(&self, kind: SourceKind, identifier: &str) -> PathBuf {
        self.root_for(kind).join(canonical_slug(identifier))
    }
}

pub struct PostInstallRelocator<M, A> {
    roots: InstallRoots,
    mover: M,
    activation: A,
}

impl<M: DirectoryMover, A: ActivationRegistry> PostInstallRelocator<M, A> {
    pub fn new(roots: InstallRoots, mover: M, activation: A) -> Self {
        Self {
            roots,
            mover,
            activation,
        }
    }

    pub fn roots(&self) -> &InstallRoots {
        &self.roots
    }

    pub fn activation(&self) -> &A {
        &self.activation
    }

    pub fn mover(&self) -> &M {
        &self.mover
    }

    /// Check error → check path → move (if needed) → reactivate (plugins, if needed).
    #[tracing::instrument(level = "debug", skip(self, transaction, install_result))]
    pub fn relocate(
        &self,
        transaction: &InstallTransaction,
        install_result: InstallResult,
        kind: SourceKind,
        identifier: &str,
    ) -> Result<RelocationOutcome, RelocateError> {
        let extracted = install_result.map_err(RelocateError::Install)?;
        let canonical = self.roots.canonical_dir(kind, identifier);

        let moved = if same_location(&extracted.destination, &canonical) {
            false
        } else {
            self.mover
                .move_dir(&extracted.destination, &canonical)
                .map_err(|source| RelocateError::Move {
                    from: extracted.destination.clone(),
                    to: canonical.clone(),
                    source,
                })?;
            tracing::info!(
                component = identifier,
                from = %extracted.destination.display(),
                to = %canonical.display(),
                "moved extracted package to canonical directory"
            );
            true
        };

        let reactivated = match kind {
            SourceKind::Plugin => self.reactivate(transaction, identifier, &canonical)?,
            SourceKind::Theme => None,
        };

        Ok(RelocationOutcome {
            destination: canonical,
            moved,
            reactivated,
        })
    }

    fn reactivate(
        &self,
        transaction: &InstallTransaction,
        identifier: &str,
        destination: &Path,
    ) -> Result<Option<ActivationScope>, RelocateError> {
        let Some(scope) = transaction.recorded_scope(identifier) else {
            return Ok(None);
        };
        if self.activation.is_active(identifier) {
            return Ok(None);
        }
        self.activation
            .activate(identifier, scope)
            .map_err(|source| RelocateError::Activation {
                identifier: identifier.to_string(),
                destination: destination.to_path_buf(),
                source,
            })?;
        tracing::info!(component = identifier, scope = scope.as_str(), "reactivated component");
        Ok(Some(scope))
    }
}
