//! Explicit handler table the host invokes at its extension points.
//!
//! One `UpdateHooks` and one `InstallHooks` are built at startup and passed
//! to whatever drives the host's update checks and install pipeline.

use anyhow::{Context, Result};
use gitup_install::{
    ActivationRegistry, DirectoryMover, InstallResult, InstallTransaction, PostInstallRelocator,
    RelocateError, RelocationOutcome,
};
use gitup_update::{
    register_metadata_headers, ComponentRegistry, ResolutionReport, SourceKind, TagSource,
    UpdateCollection, UpdateResolver,
};

/// "Before update check": adds the remote-source header to the recognized set.
pub fn before_update_check(headers: &mut Vec<String>) {
    if register_metadata_headers(headers) {
        tracing::debug!("registered remote-source metadata header");
    }
}

pub struct UpdateHooks<S, R> {
    resolver: UpdateResolver<S>,
    registry: R,
}

impl<S: TagSource, R: ComponentRegistry> UpdateHooks<S, R> {
    pub fn new(resolver: UpdateResolver<S>, registry: R) -> Self {
        Self { resolver, registry }
    }

    pub fn resolver(&self) -> &UpdateResolver<S> {
        &self.resolver
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// "Update check for plugins".
    pub fn check_plugin_updates(
        &mut self,
        collection: UpdateCollection,
    ) -> Result<(UpdateCollection, ResolutionReport)> {
        self.check_updates(SourceKind::Plugin, collection)
    }

    /// "Update check for themes".
    pub fn check_theme_updates(
        &mut self,
        collection: UpdateCollection,
    ) -> Result<(UpdateCollection, ResolutionReport)> {
        self.check_updates(SourceKind::Theme, collection)
    }

    fn check_updates(
        &mut self,
        kind: SourceKind,
        mut collection: UpdateCollection,
    ) -> Result<(UpdateCollection, ResolutionReport)> {
        if collection.remote_checked {
            let report = self.resolver.resolve(&mut collection, &[]);
            return Ok((collection, report));
        }
        let components = self
            .registry
            .list_components(kind)
            .with_context(|| format!("failed to list {kind} components"))?;
        let report = self.resolver.resolve(&mut collection, &components);
        Ok((collection, report))
    }
}

pub struct InstallHooks<M, A> {
    relocator: PostInstallRelocator<M, A>,
}

impl<M: DirectoryMover, A: ActivationRegistry> InstallHooks<M, A> {
    pub fn new(relocator: PostInstallRelocator<M, A>) -> Self {
        Self { relocator }
    }

    pub fn relocator(&self) -> &PostInstallRelocator<M, A> {
        &self.relocator
    }

    /// "Before install": snapshot which of `identifiers` are currently active.
    pub fn before_install(&self, kind: SourceKind, identifiers: &[String]) -> InstallTransaction {
        InstallTransaction::snapshot(kind, self.relocator.activation(), identifiers)
    }

    /// "After install": relocate and reactivate using the matching snapshot.
    pub fn after_install(
        &self,
        transaction: InstallTransaction,
        install_result: InstallResult,
        identifier: &str,
    ) -> Result<RelocationOutcome, RelocateError> {
        let kind = transaction.kind();
        self.relocator
            .relocate(&transaction, install_result, kind, identifier)
    }
}
