//! Constants for the download module (timeouts).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Prefix of in-flight download files inside the store.
pub(crate) const PARTIAL_FILE_PREFIX: &str = ".partial-";
