//! HTTP client wrapper for fetching gazette files.
//!
//! This module provides the `HttpClient` struct which streams response bodies
//! into a partial file next to their final location, hashing the content on
//! the way so the store never has to read it back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, Method};
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, PARTIAL_FILE_PREFIX, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::record::FileRequest;
use crate::user_agent;

/// HTTP client for downloading files with streaming support.
///
/// This client is designed to be created once and reused for multiple downloads,
/// taking advantage of connection pooling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

/// A fully received response body sitting in a partial file.
///
/// The caller owns `temp_path` and must either rename it into place or
/// remove it.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub temp_path: PathBuf,
    /// SHA-256 of the body, lowercase hex.
    pub checksum: String,
    pub size: u64,
    /// Leading bytes of the body, used for file type detection.
    pub head: Vec<u8>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes (for large files)
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        Self::try_new_with_timeouts(connect_timeout_secs, read_timeout_secs)
            .expect("failed to build HTTP client with static configuration")
    }

    /// Fallible variant of [`new_with_timeouts`](Self::new_with_timeouts).
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error (e.g. TLS backend initialization).
    pub fn try_new_with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_download_user_agent())
            .build()?;
        Ok(Self { client })
    }

    /// Fetches `request` and streams the body into a partial file in `dir`.
    ///
    /// The first `head_len` bytes of the body are kept in memory for file
    /// type detection.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL or method is invalid
    /// - The request fails (network error, timeout)
    /// - The server returns an error status (4xx, 5xx)
    /// - Writing to disk fails
    ///
    /// No partial file is left behind on error.
    #[must_use = "the partial file must be moved into place or removed"]
    #[instrument(skip(self, request, dir), fields(method = %request.method, url = %request.url))]
    pub async fn download_to_temp(
        &self,
        request: &FileRequest,
        dir: &Path,
        head_len: usize,
    ) -> Result<DownloadedFile, DownloadError> {
        debug!("starting download");

        let response = self.send_request(request).await?;

        let temp_path = dir.join(format!(
            "{PARTIAL_FILE_PREFIX}{:016x}",
            rand::random::<u64>()
        ));
        let mut file = File::create(&temp_path)
            .await
            .map_err(|e| DownloadError::io(temp_path.clone(), e))?;

        // Stream response body to file, with cleanup on error
        let stream_result =
            stream_to_file(&mut file, response, &request.url, &temp_path, head_len).await;
        drop(file);

        if stream_result.is_err() {
            debug!(path = %temp_path.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(&temp_path).await;
        }
        let summary = stream_result?;

        info!(bytes = summary.size, checksum = %summary.checksum, "download complete");

        Ok(DownloadedFile {
            temp_path,
            checksum: summary.checksum,
            size: summary.size,
            head: summary.head,
        })
    }

    async fn send_request(
        &self,
        request: &FileRequest,
    ) -> Result<reqwest::Response, DownloadError> {
        Url::parse(&request.url).map_err(|_| DownloadError::invalid_url(&request.url))?;
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| DownloadError::invalid_method(&request.url, &request.method))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(&request.url)
            } else {
                DownloadError::network(&request.url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(&request.url, status.as_u16()));
        }

        Ok(response)
    }
}

struct StreamSummary {
    size: u64,
    checksum: String,
    head: Vec<u8>,
}

/// Streams response body to file, hashing and keeping the leading bytes.
///
/// This is extracted to enable cleanup on error in the caller.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    head_len: usize,
) -> Result<StreamSummary, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut hasher = Sha256::new();
    let mut head = Vec::with_capacity(head_len);
    let mut size: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

        hasher.update(&chunk);
        if head.len() < head_len {
            let take = (head_len - head.len()).min(chunk.len());
            head.extend_from_slice(&chunk[..take]);
        }
        size += chunk.len() as u64;
    }

    // Ensure all data is flushed to disk
    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

    Ok(StreamSummary {
        size,
        checksum: format!("{:x}", hasher.finalize()),
        head,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_rejected_before_sending() {
        let client = HttpClient::new();
        let temp = tempfile::tempdir().unwrap();
        let result = client
            .download_to_temp(&FileRequest::get("not a url"), temp.path(), 8)
            .await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_invalid_method_is_rejected_before_sending() {
        let client = HttpClient::new();
        let temp = tempfile::tempdir().unwrap();
        let mut request = FileRequest::get("https://example.com/a.pdf");
        request.method = "GE T".to_string();
        let result = client.download_to_temp(&request, temp.path(), 8).await;
        assert!(matches!(result, Err(DownloadError::InvalidMethod { .. })));
    }

    #[test]
    fn test_client_builds_with_custom_timeouts() {
        assert!(HttpClient::try_new_with_timeouts(1, 2).is_ok());
    }
}
