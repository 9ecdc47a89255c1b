//! Diagnostic store for fetch failures absorbed during a resolution pass.

use std::path::{Path, PathBuf};

use anyhow::Result;
use gitup_core::{current_unix_timestamp_ms, LogRotationPolicy, RotatingJournal};
use serde::{Deserialize, Serialize};

use crate::fetcher::FetchError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchDiagnosticRecord {
    pub recorded_at_unix_ms: u64,
    pub component_identifier: String,
    pub source_uri: String,
    #[serde(default)]
    pub status: Option<u16>,
    pub message: String,
    pub raw_response: String,
}

impl FetchDiagnosticRecord {
    pub fn from_error(component_identifier: &str, error: &FetchError) -> Self {
        Self {
            recorded_at_unix_ms: current_unix_timestamp_ms(),
            component_identifier: component_identifier.to_string(),
            source_uri: error.source_uri().to_string(),
            status: error.status(),
            message: error.to_string(),
            raw_response: error.raw_response().to_string(),
        }
    }
}

/// Keeps the fetch failures of the most recent pass, optionally mirrored to
/// a rotating NDJSON journal.
#[derive(Debug, Clone, Default)]
pub struct FetchDiagnostics {
    last_pass: Vec<FetchDiagnosticRecord>,
    journal: Option<RotatingJournal>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(path: impl Into<PathBuf>, policy: LogRotationPolicy) -> Self {
        Self {
            last_pass: Vec::new(),
            journal: Some(RotatingJournal::new(path, policy)),
        }
    }

    pub fn journal_path(&self) -> Option<&Path> {
        self.journal.as_ref().map(RotatingJournal::path)
    }

    pub(crate) fn begin_pass(&mut self) {
        self.last_pass.clear();
    }

    pub fn record(&mut self, component_identifier: &str, error: &FetchError) {
        let record = FetchDiagnosticRecord::from_error(component_identifier, error);
        tracing::warn!(
            component = component_identifier,
            source_uri = record.source_uri.as_str(),
            status = ?record.status,
            "tag lookup failed: {}",
            record.message
        );
        if let Some(journal) = &self.journal {
            if let Err(error) = append_record(journal, &record) {
                tracing::warn!(
                    path = %journal.path().display(),
                    "failed to append fetch diagnostic: {error:#}"
                );
            }
        }
        self.last_pass.push(record);
    }

    pub fn records(&self) -> &[FetchDiagnosticRecord] {
        &self.last_pass
    }

    pub fn last_error(&self) -> Option<&FetchDiagnosticRecord> {
        self.last_pass.last()
    }

    /// Reads persisted records from the journal; unparseable lines are skipped.
    pub fn load_journal(&self) -> Result<Vec<FetchDiagnosticRecord>> {
        let Some(journal) = &self.journal else {
            return Ok(Vec::new());
        };
        Ok(journal
            .read_lines()?
            .iter()
            .filter_map(|line| serde_json::from_str::<FetchDiagnosticRecord>(line).ok())
            .collect())
    }
}

fn append_record(journal: &RotatingJournal, record: &FetchDiagnosticRecord) -> Result<()> {
    journal.append(&serde_json::to_string(record)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found(uri: &str) -> FetchError {
        FetchError::HttpStatus {
            source_uri: uri.to_string(),
            endpoint: format!("{uri}/tags"),
            status: 404,
            body: r#"{"message":"Not Found"}"#.to_string(),
        }
    }

    #[test]
    fn functional_record_tracks_last_error_and_resets_per_pass() {
        let mut diagnostics = FetchDiagnostics::new();
        diagnostics.record("acme/one.php", &not_found("https://github.com/acme/one"));
        diagnostics.record("acme/two.php", &not_found("https://github.com/acme/two"));
        assert_eq!(diagnostics.records().len(), 2);
        let last = diagnostics.last_error().expect("last error");
        assert_eq!(last.component_identifier, "acme/two.php");
        assert_eq!(last.status, Some(404));
        assert_eq!(last.raw_response, r#"{"message":"Not Found"}"#);

        diagnostics.begin_pass();
        assert!(diagnostics.last_error().is_none());
    }

    #[test]
    fn integration_record_appends_to_journal_and_load_skips_garbage() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("diagnostics/fetch-errors.jsonl");
        let mut diagnostics = FetchDiagnostics::with_journal(&path, LogRotationPolicy::default());
        diagnostics.record("acme/one.php", &not_found("https://github.com/acme/one"));
        RotatingJournal::new(&path, LogRotationPolicy::default())
            .append("{not json")
            .expect("append garbage");

        let loaded = diagnostics.load_journal().expect("load journal");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].source_uri, "https://github.com/acme/one");
        assert_eq!(diagnostics.journal_path(), Some(path.as_path()));
    }
}
