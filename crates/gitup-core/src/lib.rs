//! Foundational low-level utilities shared across gitup crates.
//!
//! Provides atomic state-file writes, size-rotated NDJSON journals, and time
//! helpers used by the fetch diagnostics store and the reference host.

pub mod atomic_io;
pub mod log_rotation;
pub mod time_utils;

pub use atomic_io::{read_json_if_exists, write_json_atomic};
pub use log_rotation::{LogRotationPolicy, RotatingJournal};
pub use time_utils::{current_unix_timestamp_ms, elapsed_since_unix_ms};
