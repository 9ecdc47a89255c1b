//! Install transaction context: the pre-install activation snapshot handed
//! from the "before install" step to the matching "after install" step.

use std::collections::BTreeMap;

use gitup_update::SourceKind;
use serde::{Deserialize, Serialize};

use crate::host::{ActivationRegistry, ActivationScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveStateRecord {
    pub was_active: bool,
    pub scope: ActivationScope,
}

/// Snapshot of which components were active when an install began.
///
/// Queries never consult the live registry; they answer from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTransaction {
    kind: SourceKind,
    records: BTreeMap<String, ActiveStateRecord>,
}

impl InstallTransaction {
    pub fn begin(kind: SourceKind) -> Self {
        Self {
            kind,
            records: BTreeMap::new(),
        }
    }

    /// Begins a transaction and marks each identifier the registry reports active.
    pub fn snapshot<R: ActivationRegistry + ?Sized>(
        kind: SourceKind,
        registry: &R,
        identifiers: &[String],
    ) -> Self {
        let mut transaction = Self::begin(kind);
        for identifier in identifiers {
            if let Some(scope) = registry.active_scope(identifier) {
                transaction.mark_active(identifier, scope);
            }
        }
        tracing::debug!(
            kind = kind.as_str(),
            checked = identifiers.len(),
            active = transaction.records.len(),
            "captured pre-install activation snapshot"
        );
        transaction
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Re-marking an identifier overwrites its scope.
    pub fn mark_active(&mut self, identifier: &str, scope: ActivationScope) {
        self.records.insert(
            identifier.to_string(),
            ActiveStateRecord {
                was_active: true,
                scope,
            },
        );
    }

    pub fn was_active(&self, identifier: &str) -> bool {
        self.records
            .get(identifier)
            .is_some_and(|record| record.was_active)
    }

    pub fn recorded_scope(&self, identifier: &str) -> Option<ActivationScope> {
        self.records
            .get(identifier)
            .filter(|record| record.was_active)
            .map(|record| record.scope)
    }

    pub fn records(&self) -> &BTreeMap<String, ActiveStateRecord> {
        &self.records
    }
}
