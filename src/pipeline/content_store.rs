//! Resolves a record's file references into stored files.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};

use super::{DropReason, Stage};
use crate::config::SourceConfig;
use crate::download::HttpClient;
use crate::record::{DocumentRecord, FileReference, FileRequest, FileResult, FileStatus};
use crate::store::{FilesStore, SNIFF_WINDOW, StoreError};

/// Downloads file references into a [`FilesStore`], skipping files that are
/// already on disk.
#[derive(Debug, Clone)]
pub struct ContentStore {
    store: FilesStore,
    client: HttpClient,
}

impl ContentStore {
    #[must_use]
    pub fn new(store: FilesStore, client: HttpClient) -> Self {
        Self { store, client }
    }

    #[must_use]
    pub fn files_store(&self) -> &FilesStore {
        &self.store
    }

    /// Resolves one reference. Failures are reported in the result, never
    /// returned.
    ///
    /// `headers` are added to plain URL references only; ready-made requests
    /// are sent as they are.
    #[instrument(skip(self, reference, headers), fields(url = %reference.url()))]
    pub async fn resolve(
        &self,
        reference: &FileReference,
        source_id: &str,
        date: &str,
        headers: &BTreeMap<String, String>,
    ) -> FileResult {
        match self.try_resolve(reference, source_id, date, headers).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "failed to store file");
                FileResult::failed(reference.url(), e.to_string())
            }
        }
    }

    async fn try_resolve(
        &self,
        reference: &FileReference,
        source_id: &str,
        date: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<FileResult, StoreError> {
        let request = match reference {
            FileReference::Url(url) => FileRequest {
                headers: headers.clone(),
                ..FileRequest::get(url.clone())
            },
            FileReference::Request(request) => request.clone(),
        };

        let expected = FilesStore::file_path(&request.url, source_id, date, None);
        if let Some(existing) = self.store.find_existing(&expected).await?
            && let Some(stored) = self.store.stat_file(&existing).await?
        {
            debug!(path = %stored.path, "file already present");
            return Ok(FileResult::stored(
                request.url,
                stored.path,
                stored.checksum,
                stored.size,
                FileStatus::AlreadyPresent,
            ));
        }

        let dir = self.store.prepare_dir(source_id, date).await?;
        let download = self
            .client
            .download_to_temp(&request, &dir, SNIFF_WINDOW)
            .await?;

        let path = FilesStore::file_path(
            &request.url,
            source_id,
            date,
            Some(download.head.as_slice()),
        );
        if !has_extension(&path) {
            debug!(path = %path, "file type unknown, storing without extension");
        }
        let stored = self.store.persist(&download, &path).await?;

        Ok(FileResult::stored(
            request.url,
            stored.path,
            stored.checksum,
            stored.size,
            FileStatus::Downloaded,
        ))
    }
}

fn has_extension(relative: &str) -> bool {
    relative
        .rsplit('/')
        .next()
        .is_some_and(|name| name.contains('.'))
}

#[async_trait]
impl Stage for ContentStore {
    fn name(&self) -> &'static str {
        "content_store"
    }

    async fn process(
        &self,
        mut record: DocumentRecord,
        source: &SourceConfig,
    ) -> Result<DocumentRecord, DropReason> {
        let source_id = record
            .source_id
            .clone()
            .unwrap_or_else(|| source.source_id.clone());
        let date = record.date_text();
        let references = record.file_references();

        record.files = join_all(references.iter().map(|reference| {
            self.resolve(reference, &source_id, &date, &source.download_file_headers)
        }))
        .await;

        info!(
            source_id = %source_id,
            date = %date,
            downloaded = record.count_files(FileStatus::Downloaded),
            already_present = record.count_files(FileStatus::AlreadyPresent),
            failed = record.count_files(FileStatus::Failed),
            "files resolved"
        );
        Ok(record)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::pipeline::tests::record;
    use crate::store::naming::base_name;

    fn content_store(temp: &TempDir) -> ContentStore {
        ContentStore::new(FilesStore::new(temp.path()), HttpClient::new())
    }

    #[tokio::test]
    async fn test_existing_file_with_any_extension_is_already_present() {
        // The URL has no extension and nothing listens on it, so a fetch
        // attempt would fail.
        let url = "http://127.0.0.1:9/download?id=1";
        let temp = TempDir::new().unwrap();
        let store = content_store(&temp);
        let relative = format!("X/2024-01-05/{}.pdf", base_name(url));
        let absolute = store.files_store().absolute(&relative);
        std::fs::create_dir_all(absolute.parent().unwrap()).unwrap();
        std::fs::write(&absolute, b"%PDF-1.4").unwrap();

        let result = store
            .resolve(
                &FileReference::Url(url.to_string()),
                "X",
                "2024-01-05",
                &BTreeMap::new(),
            )
            .await;

        assert_eq!(result.status, FileStatus::AlreadyPresent);
        assert_eq!(result.path.as_deref(), Some(relative.as_str()));
        assert_eq!(result.size, Some(8));
        assert!(result.checksum.is_some());
    }

    #[tokio::test]
    async fn test_unreachable_reference_fails_without_leaving_files() {
        let temp = TempDir::new().unwrap();
        let store = content_store(&temp);

        let result = store
            .resolve(
                &FileReference::Url("http://127.0.0.1:9/a.pdf".to_string()),
                "X",
                "2024-01-05",
                &BTreeMap::new(),
            )
            .await;

        assert_eq!(result.status, FileStatus::Failed);
        assert!(result.path.is_none());
        assert!(result.error.is_some());
        let dir = temp.path().join("X").join("2024-01-05");
        assert_eq!(std::fs::read_dir(dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_record_without_references_gets_no_results() {
        let temp = TempDir::new().unwrap();
        let out = content_store(&temp)
            .process(record("2024-01-05"), &SourceConfig::new("X"))
            .await
            .unwrap();
        assert!(out.files.is_empty());
    }

    #[test]
    fn test_has_extension_looks_at_file_name_only() {
        assert!(has_extension("X/2024-01-05/abc.pdf"));
        assert!(!has_extension("X/2024-01-05/abc"));
        assert!(!has_extension("X.Y/2024-01-05/abc"));
    }
}
