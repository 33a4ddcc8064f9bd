//! HTTP download layer for gazette files.
//!
//! This module fetches one [`FileRequest`](crate::record::FileRequest) at a
//! time and streams the body to disk.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - SHA-256 checksum computed while streaming
//! - Leading bytes captured for file type detection
//! - Configurable timeouts (30s connect, 5min read by default)
//! - Structured error types with full context

mod client;
mod constants;
mod error;

pub use client::{DownloadedFile, HttpClient};
pub(crate) use constants::PARTIAL_FILE_PREFIX;
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::DownloadError;
