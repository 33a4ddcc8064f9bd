//! Bounded-concurrency driver that feeds records through a [`Pipeline`].
//!
//! # Concurrency Model
//!
//! - Each record runs in its own Tokio task
//! - A semaphore permit is acquired before a record task is spawned
//! - Permits are released automatically when the task completes (RAII)
//! - No ordering is guaranteed across records; stages of one record run in
//!   order
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gazette_core::config::SourceConfig;
//! use gazette_core::download::HttpClient;
//! use gazette_core::pipeline::{ContentStore, MetadataSink, Pipeline};
//! use gazette_core::runner::PipelineRunner;
//! use gazette_core::store::FilesStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ContentStore::new(FilesStore::new("data"), HttpClient::new());
//! let pipeline = Arc::new(Pipeline::standard(store, MetadataSink::disabled()));
//! let runner = PipelineRunner::new(10)?;
//! let records = futures_util::stream::iter(Vec::new());
//! let stats = runner
//!     .run(records, pipeline, Arc::new(SourceConfig::new("3550308")))
//!     .await?;
//! println!("processed: {}, dropped: {}", stats.processed(), stats.dropped());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::{Stream, StreamExt};
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, instrument, warn};

use crate::config::SourceConfig;
use crate::pipeline::Pipeline;
use crate::record::{DocumentRecord, FileStatus};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Error type for runner operations.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Statistics from one run.
///
/// Record counts plus per-file outcome counts of the records that made it
/// through every stage.
#[derive(Debug, Default)]
pub struct RunStats {
    processed: AtomicUsize,
    dropped: AtomicUsize,
    downloaded: AtomicUsize,
    already_present: AtomicUsize,
    failed: AtomicUsize,
}

impl RunStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that went through every stage.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    /// Records dropped by a stage.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn already_present(&self) -> usize {
        self.already_present.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    fn record_processed(&self, record: &DocumentRecord) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        self.downloaded
            .fetch_add(record.count_files(FileStatus::Downloaded), Ordering::SeqCst);
        self.already_present
            .fetch_add(record.count_files(FileStatus::AlreadyPresent), Ordering::SeqCst);
        self.failed
            .fetch_add(record.count_files(FileStatus::Failed), Ordering::SeqCst);
    }

    fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Self {
        let copy = |counter: &AtomicUsize| AtomicUsize::new(counter.load(Ordering::SeqCst));
        Self {
            processed: copy(&self.processed),
            dropped: copy(&self.dropped),
            downloaded: copy(&self.downloaded),
            already_present: copy(&self.already_present),
            failed: copy(&self.failed),
        }
    }
}

/// Drives records through a shared pipeline with bounded concurrency.
#[derive(Debug)]
pub struct PipelineRunner {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    output: Option<mpsc::UnboundedSender<DocumentRecord>>,
}

impl PipelineRunner {
    /// Creates a runner processing at most `concurrency` records at once.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    #[instrument(level = "debug")]
    pub fn new(concurrency: usize) -> Result<Self, RunnerError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(RunnerError::InvalidConcurrency { value: concurrency });
        }

        debug!(concurrency, "creating pipeline runner");

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            output: None,
        })
    }

    /// Sends every fully processed record to `output`.
    #[must_use]
    pub fn with_output(mut self, output: mpsc::UnboundedSender<DocumentRecord>) -> Self {
        self.output = Some(output);
        self
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Processes every record of `records` and waits for all of them.
    ///
    /// Dropped records and per-file failures are counted, never returned as
    /// errors.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::SemaphoreClosed`] if the semaphore is closed.
    #[instrument(skip_all, fields(source_id = %source.source_id, concurrency = self.concurrency))]
    pub async fn run<S>(
        &self,
        records: S,
        pipeline: Arc<Pipeline>,
        source: Arc<SourceConfig>,
    ) -> Result<RunStats, RunnerError>
    where
        S: Stream<Item = DocumentRecord>,
    {
        let stats = Arc::new(RunStats::new());
        let mut handles = Vec::new();
        let mut records = std::pin::pin!(records);

        info!("starting pipeline run");

        while let Some(record) = records.next().await {
            // Blocks while `concurrency` records are in flight
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| RunnerError::SemaphoreClosed)?;

            let pipeline = Arc::clone(&pipeline);
            let source = Arc::clone(&source);
            let stats = Arc::clone(&stats);
            let output = self.output.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let date = record.date;

                match pipeline.process(record, &source).await {
                    Ok(record) => {
                        stats.record_processed(&record);
                        if let Some(output) = output
                            && output.send(record).is_err()
                        {
                            debug!("output receiver closed");
                        }
                    }
                    Err(reason) => {
                        debug!(%date, %reason, "record dropped");
                        stats.record_dropped();
                    }
                }
            }));
        }

        debug!(task_count = handles.len(), "waiting for records to complete");

        for handle in handles {
            // A panicking record task is logged and does not fail the run
            if let Err(e) = handle.await {
                warn!(error = %e, "record task panicked");
            }
        }

        info!(
            processed = stats.processed(),
            dropped = stats.dropped(),
            downloaded = stats.downloaded(),
            already_present = stats.already_present(),
            failed = stats.failed(),
            "pipeline run complete"
        );

        Ok(Arc::try_unwrap(stats).unwrap_or_else(|shared| shared.snapshot()))
    }
}
