//! Filesystem component registry: scans plugin and theme roots for header
//! blocks and maps them into typed descriptors.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gitup_update::{ComponentDescriptor, ComponentRegistry, SourceKind};
use regex::Regex;

const HEADER_SCAN_BYTES: u64 = 8 * 1024;
const PLUGIN_FILE_EXTENSION: &str = "php";
const THEME_STYLESHEET: &str = "style.css";

pub const DEFAULT_RECOGNIZED_HEADERS: &[&str] =
    &["Name", "Plugin Name", "Theme Name", "Version", "Description"];

/// Extracts `Key: Value` lines for each recognized header from the start of a
/// file. Comment decorations (`*`, `#`, `//`, `@`) before the key are ignored.
pub fn parse_header_block(content: &str, recognized: &[String]) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    for header in recognized {
        let pattern = format!(r"(?mi)^[ \t/*#@]*{}:(.*)$", regex::escape(header));
        let Ok(matcher) = Regex::new(&pattern) else {
            continue;
        };
        if let Some(value) = matcher
            .captures(content)
            .and_then(|captures| captures.get(1))
            .map(|value| clean_header_value(value.as_str()))
            .filter(|value| !value.is_empty())
        {
            headers.insert(header.clone(), value);
        }
    }
    headers
}

fn clean_header_value(raw: &str) -> String {
    raw.trim()
        .trim_end_matches("*/")
        .trim_end_matches("?>")
        .trim()
        .to_string()
}

fn read_header_prefix(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut buffer = Vec::new();
    file.take(HEADER_SCAN_BYTES)
        .read_to_end(&mut buffer)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&buffer).replace('\r', "\n"))
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| !name.starts_with('.'))
        })
        .collect::<Vec<_>>();
    entries.sort();
    Ok(entries)
}

fn is_plugin_file(path: &Path) -> bool {
    path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some(PLUGIN_FILE_EXTENSION)
}

#[derive(Debug, Clone)]
pub struct FilesystemRegistry {
    plugins_root: PathBuf,
    themes_root: PathBuf,
    recognized_headers: Vec<String>,
}

impl FilesystemRegistry {
    pub fn new(plugins_root: impl Into<PathBuf>, themes_root: impl Into<PathBuf>) -> Self {
        Self {
            plugins_root: plugins_root.into(),
            themes_root: themes_root.into(),
            recognized_headers: DEFAULT_RECOGNIZED_HEADERS
                .iter()
                .map(|header| header.to_string())
                .collect(),
        }
    }

    pub fn recognized_headers(&self) -> &[String] {
        &self.recognized_headers
    }

    pub fn recognized_headers_mut(&mut self) -> &mut Vec<String> {
        &mut self.recognized_headers
    }

    pub fn plugins_root(&self) -> &Path {
        &self.plugins_root
    }

    pub fn themes_root(&self) -> &Path {
        &self.themes_root
    }

    fn plugin_descriptor(
        &self,
        path: &Path,
        identifier: String,
    ) -> Result<Option<ComponentDescriptor>> {
        let headers = parse_header_block(&read_header_prefix(path)?, &self.recognized_headers);
        if !headers.contains_key("Plugin Name") {
            return Ok(None);
        }
        Ok(Some(ComponentDescriptor::from_headers(
            identifier,
            SourceKind::Plugin,
            &headers,
        )))
    }

    /// `<root>/*.php` and `<root>/<dir>/*.php` files carrying a `Plugin Name` header.
    pub fn list_plugins(&self) -> Result<Vec<ComponentDescriptor>> {
        let mut plugins = Vec::new();
        for entry in sorted_entries(&self.plugins_root)? {
            let Some(name) = entry.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if is_plugin_file(&entry) {
                plugins.extend(self.plugin_descriptor(&entry, name.to_string())?);
                continue;
            }
            if !entry.is_dir() {
                continue;
            }
            for file in sorted_entries(&entry)?.into_iter().filter(|file| is_plugin_file(file)) {
                let Some(file_name) = file.file_name().and_then(|file_name| file_name.to_str())
                else {
                    continue;
                };
                plugins.extend(self.plugin_descriptor(&file, format!("{name}/{file_name}"))?);
            }
        }
        Ok(plugins)
    }

    /// `<root>/<dir>/style.css` stylesheets carrying a `Theme Name` header.
    pub fn list_themes(&self) -> Result<Vec<ComponentDescriptor>> {
        let mut themes = Vec::new();
        for entry in sorted_entries(&self.themes_root)? {
            let stylesheet = entry.join(THEME_STYLESHEET);
            let Some(name) = entry.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !stylesheet.is_file() {
                continue;
            }
            let headers =
                parse_header_block(&read_header_prefix(&stylesheet)?, &self.recognized_headers);
            if !headers.contains_key("Theme Name") {
                continue;
            }
            themes.push(ComponentDescriptor::from_headers(
                name,
                SourceKind::Theme,
                &headers,
            ));
        }
        Ok(themes)
    }
}

impl ComponentRegistry for FilesystemRegistry {
    fn list_components(&self, kind: SourceKind) -> Result<Vec<ComponentDescriptor>> {
        match kind {
            SourceKind::Plugin => self.list_plugins(),
            SourceKind::Theme => self.list_themes(),
        }
    }
}
