//! Remote update resolution for plugins and themes that declare a source
//! repository.
//!
//! Collects eligible components, looks up their published tags, compares
//! versions, and merges update descriptors into the host's update collection
//! with at-most-once-per-cycle and first-writer-wins semantics.

pub mod component;
pub mod descriptor;
pub mod diagnostics;
pub mod fetcher;
pub mod resolver;
pub mod version;

pub use component::{
    canonical_slug, register_metadata_headers, ComponentDescriptor, ComponentRegistry,
    SourceKind, REMOTE_SOURCE_HEADER,
};
pub use descriptor::{UpdateCollection, UpdateDescriptor};
pub use diagnostics::{FetchDiagnosticRecord, FetchDiagnostics};
pub use fetcher::{
    parse_tag_response, tags_endpoint, FetchError, FetcherConfig, GitHubTagFetcher, RemoteTag,
    TagSource, TAG_LOOKUP_TIMEOUT_MS,
};
pub use resolver::{ResolutionReport, TagSelectionPolicy, UpdateResolver};
pub use version::{compare_versions, is_newer, is_well_formed};
