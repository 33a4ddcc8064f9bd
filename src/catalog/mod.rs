//! Gazette catalog: `SQLite`-backed persistence of gazette metadata.
//!
//! # Overview
//!
//! The catalog consists of:
//! - [`GazetteCatalog`] - Main interface for catalog operations
//! - [`NewGazette`] / [`Gazette`] - Insert payload and stored row
//! - [`GazetteRepository`] - Seam used by the metadata sink
//! - [`CatalogError`] - Operation error types
//!
//! Every insert runs in its own transaction. A failed insert is rolled back
//! when its transaction is dropped, so the pooled connection is clean for the
//! next row.

mod error;
mod gazette;
mod repository;

pub use error::{CatalogError, DbErrorKind};
pub use gazette::{Gazette, NewGazette};
pub use repository::GazetteRepository;

use chrono::NaiveDate;
use tracing::{debug, instrument};

use crate::db::Database;

/// A configured source, as registered in the `sources` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRegistration {
    pub spider_name: String,
    pub source_id: String,
    pub date_from: NaiveDate,
}

/// Catalog manager for gazette rows.
#[derive(Debug, Clone)]
pub struct GazetteCatalog {
    db: Database,
}

impl GazetteCatalog {
    /// Creates a catalog over an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts one gazette row in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the insert or commit fails,
    /// e.g. when the same checksum is already recorded at the same path.
    #[instrument(skip(self, gazette), fields(date = %gazette.date, checksum = %gazette.file_checksum))]
    pub async fn insert_gazette(&self, gazette: &NewGazette) -> Result<i64, CatalogError> {
        let mut tx = self.db.pool().begin().await?;

        let id: i64 = sqlx::query_scalar(
            r"INSERT INTO gazettes (
                source_id,
                date,
                edition_number,
                is_extra_edition,
                power,
                source_text,
                scraped_at,
                file_path,
                file_url,
                file_checksum
              )
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              RETURNING id",
        )
        .bind(&gazette.source_id)
        .bind(gazette.date.format("%Y-%m-%d").to_string())
        .bind(&gazette.edition_number)
        .bind(gazette.is_extra_edition)
        .bind(gazette.power.as_str())
        .bind(&gazette.source_text)
        .bind(&gazette.scraped_at)
        .bind(&gazette.file_path)
        .bind(&gazette.file_url)
        .bind(&gazette.file_checksum)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(id, "gazette persisted");
        Ok(id)
    }

    /// Upserts the configured sources into the `sources` table.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if any upsert fails; nothing is
    /// written in that case.
    #[instrument(skip(self, sources), fields(count = sources.len()))]
    pub async fn register_sources(
        &self,
        sources: &[SourceRegistration],
    ) -> Result<(), CatalogError> {
        let mut tx = self.db.pool().begin().await?;
        for source in sources {
            sqlx::query(
                r"INSERT INTO sources (spider_name, source_id, date_from)
                  VALUES (?, ?, ?)
                  ON CONFLICT (spider_name) DO UPDATE SET
                      source_id = excluded.source_id,
                      date_from = excluded.date_from,
                      updated_at = datetime('now')",
            )
            .bind(&source.spider_name)
            .bind(&source.source_id)
            .bind(source.date_from.format("%Y-%m-%d").to_string())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Returns the registered sources ordered by spider name.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn list_sources(&self) -> Result<Vec<(String, String, String)>, CatalogError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT spider_name, source_id, date_from FROM sources ORDER BY spider_name",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Counts all persisted gazette rows.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn count(&self) -> Result<i64, CatalogError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM gazettes")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Returns the rows of one source ordered by date, then id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn list_by_source(&self, source_id: &str) -> Result<Vec<Gazette>, CatalogError> {
        let rows = sqlx::query_as::<_, Gazette>(
            "SELECT * FROM gazettes WHERE source_id = ? ORDER BY date, id",
        )
        .bind(source_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }
}
