//! Persists one catalog row per newly downloaded file.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{DropReason, Stage};
use crate::catalog::{GazetteRepository, NewGazette};
use crate::config::SourceConfig;
use crate::record::{DocumentRecord, FileStatus};

/// Counters of what the sink did with each file result.
///
/// Uses atomic counters so concurrent record tasks can share one instance.
#[derive(Debug, Default)]
pub struct SinkStats {
    persisted: AtomicUsize,
    skipped: AtomicUsize,
    discarded: AtomicUsize,
}

impl SinkStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current counts.
    #[must_use]
    pub fn report(&self) -> SinkReport {
        SinkReport {
            persisted: self.persisted.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            discarded: self.discarded.load(Ordering::SeqCst),
        }
    }
}

/// Final state of every file result the sink saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkReport {
    /// Rows written.
    pub persisted: usize,
    /// Already-present or failed results; no row attempted.
    pub skipped: usize,
    /// Rows rejected by the database and dropped.
    pub discarded: usize,
}

/// Writes a row for each `Downloaded` file result of a record.
///
/// With no repository the sink passes records through untouched.
#[derive(Clone)]
pub struct MetadataSink {
    repository: Option<Arc<dyn GazetteRepository>>,
    stats: Arc<SinkStats>,
}

impl std::fmt::Debug for MetadataSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataSink")
            .field("enabled", &self.is_enabled())
            .field("stats", &self.stats.report())
            .finish()
    }
}

impl MetadataSink {
    #[must_use]
    pub fn new(repository: Arc<dyn GazetteRepository>) -> Self {
        Self {
            repository: Some(repository),
            stats: Arc::new(SinkStats::new()),
        }
    }

    /// A sink that persists nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            repository: None,
            stats: Arc::new(SinkStats::new()),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.repository.is_some()
    }

    /// Shared counters; stays valid after the sink moves into a pipeline.
    #[must_use]
    pub fn stats(&self) -> Arc<SinkStats> {
        Arc::clone(&self.stats)
    }

    async fn persist(&self, repository: &dyn GazetteRepository, record: &DocumentRecord) {
        for file in &record.files {
            if file.status != FileStatus::Downloaded {
                debug!(url = %file.url, status = file.status.as_str(), "no row for file");
                self.stats.skipped.fetch_add(1, Ordering::SeqCst);
                continue;
            }

            let result = match NewGazette::from_record(record, file) {
                Ok(row) => repository.insert_gazette(&row).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(id) => {
                    debug!(id, url = %file.url, "gazette row persisted");
                    self.stats.persisted.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => {
                    warn!(
                        date = %record.date,
                        checksum = file.checksum.as_deref().unwrap_or_default(),
                        url = %file.url,
                        error = %e,
                        "failed to persist gazette, discarding row"
                    );
                    self.stats.discarded.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }
}

#[async_trait]
impl Stage for MetadataSink {
    fn name(&self) -> &'static str {
        "metadata_sink"
    }

    async fn process(
        &self,
        record: DocumentRecord,
        _source: &SourceConfig,
    ) -> Result<DocumentRecord, DropReason> {
        if let Some(repository) = &self.repository {
            self.persist(repository.as_ref(), &record).await;
        }
        Ok(record)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::catalog::{CatalogError, DbErrorKind};
    use crate::pipeline::tests::record;
    use crate::record::FileResult;

    /// Records inserted rows; rejects checksums listed in `reject`.
    #[derive(Default)]
    struct FakeRepository {
        rows: Mutex<Vec<NewGazette>>,
        reject: Vec<&'static str>,
    }

    #[async_trait]
    impl GazetteRepository for FakeRepository {
        async fn insert_gazette(&self, gazette: &NewGazette) -> Result<i64, CatalogError> {
            if self.reject.contains(&gazette.file_checksum.as_str()) {
                return Err(CatalogError::Database {
                    kind: DbErrorKind::ConstraintViolation,
                    message: "UNIQUE constraint failed: gazettes.file_checksum, gazettes.file_path".to_string(),
                });
            }
            let mut rows = self.rows.lock().unwrap();
            rows.push(gazette.clone());
            Ok(i64::try_from(rows.len()).unwrap())
        }
    }

    fn normalized_record(files: Vec<FileResult>) -> DocumentRecord {
        let mut record = record("2024-01-05");
        record.source_id = Some("X".to_string());
        record.scraped_at = Some("2024-01-06T10:00:00.000000Z".to_string());
        record.files = files;
        record
    }

    fn downloaded(checksum: &str) -> FileResult {
        FileResult::stored(
            format!("https://example.com/{checksum}.pdf"),
            format!("X/2024-01-05/{checksum}.pdf"),
            checksum,
            1,
            FileStatus::Downloaded,
        )
    }

    #[tokio::test]
    async fn test_only_downloaded_files_produce_rows() {
        let repository = Arc::new(FakeRepository::default());
        let sink = MetadataSink::new(repository.clone());
        let record = normalized_record(vec![
            downloaded("a"),
            FileResult::stored("u", "X/2024-01-05/b.pdf", "b", 1, FileStatus::AlreadyPresent),
            FileResult::failed("u2", "boom"),
        ]);

        sink.process(record, &SourceConfig::new("X")).await.unwrap();

        let rows = repository.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].file_checksum, "a");
        assert_eq!(
            sink.stats().report(),
            SinkReport {
                persisted: 1,
                skipped: 2,
                discarded: 0
            }
        );
    }

    #[tokio::test]
    async fn test_rejected_row_does_not_stop_later_rows() {
        let repository = Arc::new(FakeRepository {
            reject: vec!["a"],
            ..FakeRepository::default()
        });
        let sink = MetadataSink::new(repository.clone());
        let source = SourceConfig::new("X");

        sink.process(normalized_record(vec![downloaded("a"), downloaded("b")]), &source)
            .await
            .unwrap();
        sink.process(normalized_record(vec![downloaded("c")]), &source)
            .await
            .unwrap();

        let checksums: Vec<_> = repository
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(|row| row.file_checksum.clone())
            .collect();
        assert_eq!(checksums, vec!["b", "c"]);
        assert_eq!(sink.stats().report().discarded, 1);
    }

    #[tokio::test]
    async fn test_unnormalized_record_is_discarded_not_fatal() {
        let repository = Arc::new(FakeRepository::default());
        let sink = MetadataSink::new(repository.clone());
        let mut record = normalized_record(vec![downloaded("a")]);
        record.scraped_at = None;

        let out = sink.process(record, &SourceConfig::new("X")).await.unwrap();

        assert_eq!(out.files.len(), 1);
        assert!(repository.rows.lock().unwrap().is_empty());
        assert_eq!(sink.stats().report().discarded, 1);
    }

    #[tokio::test]
    async fn test_disabled_sink_passes_records_through() {
        let sink = MetadataSink::disabled();
        assert!(!sink.is_enabled());
        let out = sink
            .process(normalized_record(vec![downloaded("a")]), &SourceConfig::new("X"))
            .await
            .unwrap();
        assert_eq!(out.files.len(), 1);
        assert_eq!(sink.stats().report(), SinkReport::default());
    }
}
