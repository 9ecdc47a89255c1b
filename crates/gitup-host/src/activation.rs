//! JSON-file activation registry for the reference host.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use gitup_core::{read_json_if_exists, write_json_atomic};
use gitup_install::{ActivationError, ActivationRegistry, ActivationScope};
use serde::{Deserialize, Serialize};

pub const ACTIVATION_STORE_SCHEMA_VERSION: u32 = 1;
pub const ACTIVATION_STORE_FILE_NAME: &str = "active-components.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationStoreFile {
    pub schema_version: u32,
    #[serde(default)]
    pub plugins: BTreeMap<String, ActivationScope>,
}

impl Default for ActivationStoreFile {
    fn default() -> Self {
        Self {
            schema_version: ACTIVATION_STORE_SCHEMA_VERSION,
            plugins: BTreeMap::new(),
        }
    }
}

/// Plugin activation keyed by identifier, persisted as one JSON document.
#[derive(Debug, Clone)]
pub struct JsonActivationStore {
    path: PathBuf,
    plugins_root: PathBuf,
}

impl JsonActivationStore {
    pub fn new(path: impl Into<PathBuf>, plugins_root: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            plugins_root: plugins_root.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ActivationStoreFile> {
        let Some(parsed) = read_json_if_exists::<ActivationStoreFile>(&self.path)
            .context("failed to load activation store")?
        else {
            return Ok(ActivationStoreFile::default());
        };
        if parsed.schema_version != ACTIVATION_STORE_SCHEMA_VERSION {
            bail!(
                "unsupported activation store schema_version {} in {} (expected {})",
                parsed.schema_version,
                self.path.display(),
                ACTIVATION_STORE_SCHEMA_VERSION
            );
        }
        Ok(parsed)
    }

    pub fn save(&self, store: &ActivationStoreFile) -> Result<()> {
        write_json_atomic(&self.path, store)
    }

    /// Removes the plugin's activation entry; returns whether one existed.
    pub fn deactivate(&self, identifier: &str) -> Result<bool> {
        let mut store = self.load()?;
        let removed = store.plugins.remove(identifier).is_some();
        if removed {
            self.save(&store)?;
        }
        Ok(removed)
    }

    fn scope_of(&self, identifier: &str) -> Option<ActivationScope> {
        match self.load() {
            Ok(store) => store.plugins.get(identifier).copied(),
            Err(error) => {
                tracing::warn!("treating '{identifier}' as inactive: {error:#}");
                None
            }
        }
    }
}

impl ActivationRegistry for JsonActivationStore {
    fn is_active(&self, identifier: &str) -> bool {
        self.scope_of(identifier).is_some()
    }

    fn is_active_network_wide(&self, identifier: &str) -> bool {
        self.scope_of(identifier) == Some(ActivationScope::Network)
    }

    fn activate(&self, identifier: &str, scope: ActivationScope) -> Result<(), ActivationError> {
        if !self.plugins_root.join(identifier).is_file() {
            return Err(ActivationError::NotInstalled(identifier.to_string()));
        }
        let mut store = self
            .load()
            .map_err(|error| ActivationError::Store(format!("{error:#}")))?;
        store.plugins.insert(identifier.to_string(), scope);
        self.save(&store)
            .map_err(|error| ActivationError::Store(format!("{error:#}")))
    }
}
