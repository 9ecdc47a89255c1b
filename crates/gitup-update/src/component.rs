//! Typed component descriptors and the header-name mapping table used at the
//! registry boundary.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Metadata header declaring the remote repository a component updates from.
pub const REMOTE_SOURCE_HEADER: &str = "GitHub URI";

const PLUGIN_NAME_HEADERS: &[&str] = &["Plugin Name", "Name"];
const THEME_NAME_HEADERS: &[&str] = &["Theme Name", "Name"];
const VERSION_HEADER: &str = "Version";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Plugin,
    Theme,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Plugin => "plugin",
            SourceKind::Theme => "theme",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "plugin" => Ok(Self::Plugin),
            "theme" => Ok(Self::Theme),
            _ => anyhow::bail!("invalid component kind '{}'; expected plugin|theme", value),
        }
    }
}

/// One installable plugin or theme, rebuilt from the registry on every pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub identifier: String,
    pub display_name: String,
    pub current_version: String,
    #[serde(default)]
    pub remote_source_uri: Option<String>,
    pub source_kind: SourceKind,
}

impl ComponentDescriptor {
    /// Maps a raw header block onto the typed descriptor. Plugins and themes
    /// use different name headers; everything else is shared.
    pub fn from_headers(
        identifier: impl Into<String>,
        source_kind: SourceKind,
        headers: &BTreeMap<String, String>,
    ) -> Self {
        let identifier = identifier.into();
        let name_headers = match source_kind {
            SourceKind::Plugin => PLUGIN_NAME_HEADERS,
            SourceKind::Theme => THEME_NAME_HEADERS,
        };
        let display_name = name_headers
            .iter()
            .find_map(|key| header_value(headers, key))
            .unwrap_or_else(|| identifier.clone());
        Self {
            display_name,
            current_version: header_value(headers, VERSION_HEADER).unwrap_or_default(),
            remote_source_uri: header_value(headers, REMOTE_SOURCE_HEADER),
            source_kind,
            identifier,
        }
    }

    /// Present and non-empty remote source; absence hides the component from update checks.
    pub fn remote_source(&self) -> Option<&str> {
        self.remote_source_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
    }

    pub fn canonical_slug(&self) -> String {
        canonical_slug(&self.identifier)
    }
}

fn header_value(headers: &BTreeMap<String, String>, key: &str) -> Option<String> {
    headers
        .get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Directory name a component must occupy: the first path segment of
/// `dir/main.php`, or the file stem of a single-file `hello.php`.
pub fn canonical_slug(identifier: &str) -> String {
    let trimmed = identifier.trim().trim_matches('/');
    if let Some((first, _)) = trimmed.split_once('/') {
        return first.to_string();
    }
    match trimmed.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => trimmed.to_string(),
    }
}

/// Adds the remote-source header to the recognized header set exactly once.
/// Returns true when the header was newly registered.
pub fn register_metadata_headers(headers: &mut Vec<String>) -> bool {
    if headers.iter().any(|header| header == REMOTE_SOURCE_HEADER) {
        return false;
    }
    headers.push(REMOTE_SOURCE_HEADER.to_string());
    true
}

/// Read side of the host's plugin/theme registry.
pub trait ComponentRegistry {
    fn list_components(&self, kind: SourceKind) -> Result<Vec<ComponentDescriptor>>;
}
