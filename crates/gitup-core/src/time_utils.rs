/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Milliseconds elapsed between `started_unix_ms` and now, saturating at zero.
pub fn elapsed_since_unix_ms(started_unix_ms: u64) -> u64 {
    current_unix_timestamp_ms().saturating_sub(started_unix_ms)
}
