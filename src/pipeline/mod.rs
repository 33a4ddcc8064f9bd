//! Item pipeline: the ordered stages every gazette record passes through.
//!
//! # Overview
//!
//! A [`Pipeline`] is built once at startup and shared by all record tasks.
//! Stages run strictly in order for a single record:
//!
//! 1. [`DateGate`] - drops records published before the source's start date
//! 2. [`Normalizer`] - stamps source id and scrape timestamp
//! 3. [`ContentStore`] - downloads file references into the file store
//! 4. [`MetadataSink`] - persists one row per newly downloaded file
//!
//! A stage either hands the record on or drops it with a [`DropReason`].
//! Per-file failures are not drops: they are recorded on the record's
//! [`FileResult`](crate::record::FileResult)s and later stages still run.

mod content_store;
mod date_gate;
mod normalizer;
mod sink;

pub use content_store::ContentStore;
pub use date_gate::DateGate;
pub use normalizer::{Normalizer, SCRAPED_AT_FORMAT};
pub use sink::{MetadataSink, SinkReport, SinkStats};

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::SourceConfig;
use crate::record::DocumentRecord;

/// Why a record left the pipeline early. Not an error: dropped records are
/// counted and logged at debug level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropReason {
    /// The record was published before the configured start date.
    #[error("date {date} is before the configured start date {cutoff}")]
    OutOfRange { date: NaiveDate, cutoff: NaiveDate },
}

/// One step of the item pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Transforms `record`, or drops it.
    async fn process(
        &self,
        record: DocumentRecord,
        source: &SourceConfig,
    ) -> Result<DocumentRecord, DropReason>;
}

/// An ordered list of stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    /// Creates a pipeline running `stages` in the given order.
    #[must_use]
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// The gazette pipeline: date gate, normalizer, content store, sink.
    #[must_use]
    pub fn standard(store: ContentStore, sink: MetadataSink) -> Self {
        Self::new(vec![
            Box::new(DateGate),
            Box::new(Normalizer),
            Box::new(store),
            Box::new(sink),
        ])
    }

    /// Names of the stages, in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Runs `record` through every stage.
    ///
    /// # Errors
    ///
    /// Returns the [`DropReason`] of the first stage that dropped the record.
    /// Later stages do not run in that case.
    #[instrument(skip_all, fields(date = %record.date))]
    pub async fn process(
        &self,
        mut record: DocumentRecord,
        source: &SourceConfig,
    ) -> Result<DocumentRecord, DropReason> {
        for stage in &self.stages {
            record = stage.process(record, source).await?;
            debug!(stage = stage.name(), "stage complete");
        }
        Ok(record)
    }
}
