//! Update descriptors and the host-owned update collection they merge into.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::component::{ComponentDescriptor, SourceKind};
use crate::fetcher::RemoteTag;

/// Normalized "update available" record for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDescriptor {
    pub component_identifier: String,
    pub new_version: String,
    pub package_url: String,
    pub canonical_slug: String,
    /// Repository page the update came from. Plugin descriptors only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_url: Option<String>,
}

impl UpdateDescriptor {
    pub fn for_component(component: &ComponentDescriptor, tag: &RemoteTag) -> Self {
        let origin_url = match component.source_kind {
            SourceKind::Plugin => component.remote_source().map(str::to_string),
            SourceKind::Theme => None,
        };
        Self {
            component_identifier: component.identifier.clone(),
            new_version: tag.tag_name.clone(),
            package_url: tag.archive_url.clone(),
            canonical_slug: component.canonical_slug(),
            origin_url,
        }
    }
}

/// The host's in-progress update collection for one check cycle.
///
/// `remote_checked` is set once a resolution pass has run so that the host
/// re-invoking the same hook within a cycle does not trigger new lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCollection {
    #[serde(default)]
    pub response: BTreeMap<String, UpdateDescriptor>,
    #[serde(default)]
    pub remote_checked: bool,
    #[serde(default)]
    pub last_checked_unix_ms: Option<u64>,
}

impl UpdateCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor(&self, identifier: &str) -> Option<&UpdateDescriptor> {
        self.response.get(identifier)
    }

    pub fn has_descriptor(&self, identifier: &str) -> bool {
        self.response.contains_key(identifier)
    }

    /// First writer wins: an existing descriptor for the identifier is kept.
    pub fn insert_if_absent(&mut self, descriptor: UpdateDescriptor) -> bool {
        if self.has_descriptor(&descriptor.component_identifier) {
            return false;
        }
        self.response
            .insert(descriptor.component_identifier.clone(), descriptor);
        true
    }

    pub fn mark_remote_checked(&mut self, checked_at_unix_ms: u64) {
        self.remote_checked = true;
        self.last_checked_unix_ms = Some(checked_at_unix_ms);
    }

    pub fn len(&self) -> usize {
        self.response.len()
    }

    pub fn is_empty(&self) -> bool {
        self.response.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(kind: SourceKind) -> ComponentDescriptor {
        ComponentDescriptor {
            identifier: "acme/widget.php".to_string(),
            display_name: "Acme Widget".to_string(),
            current_version: "1.0.0".to_string(),
            remote_source_uri: Some("https://github.com/acme/widget".to_string()),
            source_kind: kind,
        }
    }

    fn tag() -> RemoteTag {
        RemoteTag {
            tag_name: "1.1.0".to_string(),
            archive_url: "https://x/1.1.0.zip".to_string(),
            commit_url: None,
        }
    }

    #[test]
    fn unit_for_component_keeps_origin_url_for_plugins_only() {
        let plugin = UpdateDescriptor::for_component(&component(SourceKind::Plugin), &tag());
        assert_eq!(
            plugin.origin_url.as_deref(),
            Some("https://github.com/acme/widget")
        );
        assert_eq!(plugin.canonical_slug, "acme");

        let theme = UpdateDescriptor::for_component(&component(SourceKind::Theme), &tag());
        assert_eq!(theme.origin_url, None);
        let encoded = serde_json::to_value(&theme).expect("encode");
        assert!(encoded.get("origin_url").is_none());
    }

    #[test]
    fn functional_insert_if_absent_keeps_first_writer() {
        let mut collection = UpdateCollection::new();
        let first = UpdateDescriptor::for_component(&component(SourceKind::Plugin), &tag());
        let mut second = first.clone();
        second.new_version = "9.9.9".to_string();

        assert!(collection.insert_if_absent(first));
        assert!(!collection.insert_if_absent(second));
        assert_eq!(
            collection
                .descriptor("acme/widget.php")
                .map(|descriptor| descriptor.new_version.as_str()),
            Some("1.1.0")
        );
        assert_eq!(collection.len(), 1);
    }
}
