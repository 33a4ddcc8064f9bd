//! Stamps records with their source id and scrape time.

use async_trait::async_trait;
use chrono::Utc;

use super::{DropReason, Stage};
use crate::config::SourceConfig;
use crate::record::DocumentRecord;

/// Format of `scraped_at`: UTC with microseconds and a `Z` marker.
pub const SCRAPED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Sets `source_id` and `scraped_at`. Never drops a record.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    /// Applies the source's identifier and the current time to `record`.
    pub fn normalize(record: &mut DocumentRecord, source: &SourceConfig) {
        record.source_id = Some(source.source_id.clone());
        record.scraped_at = Some(Utc::now().format(SCRAPED_AT_FORMAT).to_string());
    }
}

#[async_trait]
impl Stage for Normalizer {
    fn name(&self) -> &'static str {
        "normalizer"
    }

    async fn process(
        &self,
        mut record: DocumentRecord,
        source: &SourceConfig,
    ) -> Result<DocumentRecord, DropReason> {
        Self::normalize(&mut record, source);
        Ok(record)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;
    use crate::pipeline::tests::record;

    #[test]
    fn test_normalize_sets_source_id_and_timestamp() {
        let mut record = record("2024-01-05");
        Normalizer::normalize(&mut record, &SourceConfig::new("3550308"));

        assert_eq!(record.source_id.as_deref(), Some("3550308"));
        let scraped_at = record.scraped_at.unwrap();
        assert!(scraped_at.ends_with('Z'), "{scraped_at}");
        assert!(NaiveDateTime::parse_from_str(&scraped_at, SCRAPED_AT_FORMAT).is_ok());
        // e.g. 2024-01-06T10:00:00.123456Z
        assert_eq!(scraped_at.len(), 27);
    }

    #[test]
    fn test_normalize_overrides_crawler_supplied_source_id() {
        let mut record = record("2024-01-05");
        record.source_id = Some("wrong".to_string());
        Normalizer::normalize(&mut record, &SourceConfig::new("2927408"));
        assert_eq!(record.source_id.as_deref(), Some("2927408"));
    }

    #[tokio::test]
    async fn test_date_keeps_canonical_text_form() {
        let out = Normalizer
            .process(record("2024-01-05"), &SourceConfig::new("X"))
            .await
            .unwrap();
        assert_eq!(out.date_text(), "2024-01-05");
        assert_eq!(serde_json::to_value(&out).unwrap()["date"], "2024-01-05");
    }
}
