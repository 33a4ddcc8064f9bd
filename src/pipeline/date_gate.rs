//! Drops records published before a source's start date.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{DropReason, Stage};
use crate::config::SourceConfig;
use crate::record::DocumentRecord;

/// Start-date filter. Stateless; the cutoff comes from [`SourceConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DateGate;

impl DateGate {
    /// Accepts `record` unless it predates `cutoff`. A record dated exactly
    /// on the cutoff is accepted, and no cutoff accepts everything.
    ///
    /// # Errors
    ///
    /// Returns [`DropReason::OutOfRange`] when `record.date < cutoff`.
    pub fn check(record: &DocumentRecord, cutoff: Option<NaiveDate>) -> Result<(), DropReason> {
        match cutoff {
            Some(cutoff) if record.date < cutoff => Err(DropReason::OutOfRange {
                date: record.date,
                cutoff,
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Stage for DateGate {
    fn name(&self) -> &'static str {
        "date_gate"
    }

    async fn process(
        &self,
        record: DocumentRecord,
        source: &SourceConfig,
    ) -> Result<DocumentRecord, DropReason> {
        Self::check(&record, source.start_date)?;
        Ok(record)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pipeline::tests::record;

    fn day(text: &str) -> NaiveDate {
        text.parse().unwrap()
    }

    #[test]
    fn test_record_before_cutoff_is_out_of_range() {
        let err = DateGate::check(&record("2023-12-31"), Some(day("2024-01-01"))).unwrap_err();
        assert_eq!(
            err,
            DropReason::OutOfRange {
                date: day("2023-12-31"),
                cutoff: day("2024-01-01"),
            }
        );
    }

    #[test]
    fn test_record_on_cutoff_passes() {
        assert!(DateGate::check(&record("2024-01-01"), Some(day("2024-01-01"))).is_ok());
        assert!(DateGate::check(&record("2024-06-30"), Some(day("2024-01-01"))).is_ok());
    }

    #[test]
    fn test_no_cutoff_accepts_any_date() {
        assert!(DateGate::check(&record("1900-01-01"), None).is_ok());
    }

    #[tokio::test]
    async fn test_stage_leaves_record_unchanged() {
        let source = SourceConfig::new("X").with_start_date(day("2024-01-01"));
        let out = DateGate.process(record("2024-01-05"), &source).await.unwrap();
        assert_eq!(out.date, day("2024-01-05"));
        assert!(out.source_id.is_none());
    }
}
