//! Gazette Core Library
//!
//! This library provides the item pipeline of the gazette collector: records
//! discovered by per-source crawlers are filtered, normalized, have their
//! files downloaded into a store partitioned by source and date, and get one
//! catalog row per newly downloaded file.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`record`] - Gazette records and file descriptors
//! - [`config`] - TOML configuration and per-source settings
//! - [`db`] - Database connection and schema management
//! - [`catalog`] - Gazette rows and the source catalog
//! - [`download`] - HTTP client with streaming support
//! - [`store`] - File store layout, lookup and extension sniffing
//! - [`pipeline`] - The ordered pipeline stages
//! - [`runner`] - Bounded-concurrency driver over a record feed
//! - [`feed`] - JSON-lines record input

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod db;
pub mod download;
pub mod feed;
pub mod pipeline;
pub mod record;
pub mod runner;
pub mod store;
mod user_agent;

// Re-export commonly used types
pub use catalog::{CatalogError, GazetteCatalog, GazetteRepository, SourceRegistration};
pub use config::{PipelineConfig, SourceConfig};
pub use db::{Database, DatabaseOptions, DbError};
pub use download::{DownloadError, HttpClient};
pub use pipeline::{ContentStore, DateGate, DropReason, MetadataSink, Normalizer, Pipeline, Stage};
pub use record::{DocumentRecord, FileReference, FileRequest, FileResult, FileStatus, Power};
pub use runner::{DEFAULT_CONCURRENCY, PipelineRunner, RunStats, RunnerError};
pub use store::{FilesStore, StoreError};
