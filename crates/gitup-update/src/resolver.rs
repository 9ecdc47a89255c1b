//! Update resolution pass: eligible components → tag lookup → version
//! evaluation → merge into the host's update collection.

use gitup_core::{current_unix_timestamp_ms, elapsed_since_unix_ms};
use serde::{Deserialize, Serialize};

use crate::component::ComponentDescriptor;
use crate::descriptor::{UpdateCollection, UpdateDescriptor};
use crate::diagnostics::{FetchDiagnosticRecord, FetchDiagnostics};
use crate::fetcher::{RemoteTag, TagSource};
use crate::version::{is_newer, is_well_formed};

/// Which qualifying tag becomes the update when several exceed the current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagSelectionPolicy {
    /// First newer tag in the order the remote returned them.
    #[default]
    FirstNewer,
    /// Highest newer tag; earlier tags win ties.
    HighestNewer,
}

impl TagSelectionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            TagSelectionPolicy::FirstNewer => "first-newer",
            TagSelectionPolicy::HighestNewer => "highest-newer",
        }
    }

    pub fn select<'a>(
        self,
        tags: &'a [RemoteTag],
        current_version: &str,
    ) -> Option<&'a RemoteTag> {
        let mut newer = tags
            .iter()
            .filter(|tag| is_newer(&tag.tag_name, current_version));
        match self {
            TagSelectionPolicy::FirstNewer => newer.next(),
            TagSelectionPolicy::HighestNewer => newer.fold(None, |best: Option<&RemoteTag>, tag| {
                match best {
                    Some(current_best) if !is_newer(&tag.tag_name, &current_best.tag_name) => {
                        Some(current_best)
                    }
                    _ => Some(tag),
                }
            }),
        }
    }
}

impl std::fmt::Display for TagSelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TagSelectionPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value {
            "first-newer" => Ok(Self::FirstNewer),
            "highest-newer" => Ok(Self::HighestNewer),
            _ => anyhow::bail!(
                "invalid tag policy '{}'; expected first-newer|highest-newer",
                value
            ),
        }
    }
}

/// Summary of one `resolve` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    pub already_checked: bool,
    pub eligible: usize,
    pub fetched: usize,
    pub produced: Vec<String>,
    pub skipped_existing: Vec<String>,
    pub errors: Vec<FetchDiagnosticRecord>,
}

pub struct UpdateResolver<S> {
    source: S,
    policy: TagSelectionPolicy,
    diagnostics: FetchDiagnostics,
}

impl<S: TagSource> UpdateResolver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            policy: TagSelectionPolicy::default(),
            diagnostics: FetchDiagnostics::new(),
        }
    }

    pub fn with_policy(mut self, policy: TagSelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: FetchDiagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn policy(&self) -> TagSelectionPolicy {
        self.policy
    }

    pub fn diagnostics(&self) -> &FetchDiagnostics {
        &self.diagnostics
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs one resolution pass over `components`, merging descriptors into
    /// `collection`. A collection already marked as checked is left untouched.
    #[tracing::instrument(level = "debug", skip_all, fields(components = components.len()))]
    pub fn resolve(
        &mut self,
        collection: &mut UpdateCollection,
        components: &[ComponentDescriptor],
    ) -> ResolutionReport {
        if collection.remote_checked {
            tracing::debug!("update collection already checked in this cycle");
            return ResolutionReport {
                already_checked: true,
                ..ResolutionReport::default()
            };
        }

        let started_unix_ms = current_unix_timestamp_ms();
        self.diagnostics.begin_pass();
        let mut report = ResolutionReport::default();
        let eligible = components
            .iter()
            .filter_map(|component| component.remote_source().map(|uri| (component, uri)));

        let mut produced = Vec::new();
        for (component, source_uri) in eligible {
            report.eligible += 1;
            if collection.has_descriptor(&component.identifier) {
                report.skipped_existing.push(component.identifier.clone());
                continue;
            }

            report.fetched += 1;
            let tags = match self.source.fetch_tags(source_uri) {
                Ok(tags) => tags,
                Err(error) => {
                    self.diagnostics.record(&component.identifier, &error);
                    continue;
                }
            };
            if let Some(descriptor) = self.evaluate(component, &tags) {
                produced.push(descriptor);
            }
        }

        for descriptor in produced {
            let identifier = descriptor.component_identifier.clone();
            if collection.insert_if_absent(descriptor) {
                report.produced.push(identifier);
            }
        }
        collection.mark_remote_checked(current_unix_timestamp_ms());
        report.errors = self.diagnostics.records().to_vec();
        tracing::debug!(
            eligible = report.eligible,
            fetched = report.fetched,
            produced = report.produced.len(),
            errors = report.errors.len(),
            elapsed_ms = elapsed_since_unix_ms(started_unix_ms),
            "resolution pass complete"
        );
        report
    }

    fn evaluate(
        &self,
        component: &ComponentDescriptor,
        tags: &[RemoteTag],
    ) -> Option<UpdateDescriptor> {
        if tags.is_empty() {
            tracing::debug!(component = component.identifier.as_str(), "no remote tags");
            return None;
        }
        if !is_well_formed(&component.current_version) {
            tracing::debug!(
                component = component.identifier.as_str(),
                version = component.current_version.as_str(),
                "current version is unparseable; skipping"
            );
            return None;
        }
        let tag = self.policy.select(tags, &component.current_version)?;
        tracing::info!(
            component = component.identifier.as_str(),
            current = component.current_version.as_str(),
            available = tag.tag_name.as_str(),
            policy = self.policy.as_str(),
            "update available"
        );
        Some(UpdateDescriptor::for_component(component, tag))
    }
}
