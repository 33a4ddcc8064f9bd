//! Gazette rows: the insert payload and the stored shape.

use chrono::NaiveDate;
use sqlx::FromRow;

use super::CatalogError;
use crate::record::{DocumentRecord, FileResult, Power};

/// Row to insert for one newly downloaded gazette file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGazette {
    pub source_id: String,
    pub date: NaiveDate,
    pub edition_number: Option<String>,
    pub is_extra_edition: bool,
    pub power: Power,
    pub source_text: String,
    pub scraped_at: String,
    pub file_path: String,
    pub file_url: String,
    pub file_checksum: String,
}

impl NewGazette {
    /// Maps a normalized record plus one of its stored files onto a row.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Incomplete`] when the record was not
    /// normalized or the file has no path/checksum.
    pub fn from_record(record: &DocumentRecord, file: &FileResult) -> Result<Self, CatalogError> {
        let source_id = record
            .source_id
            .clone()
            .ok_or(CatalogError::Incomplete { field: "source_id" })?;
        let scraped_at = record
            .scraped_at
            .clone()
            .ok_or(CatalogError::Incomplete { field: "scraped_at" })?;
        let file_path = file
            .path
            .clone()
            .ok_or(CatalogError::Incomplete { field: "file_path" })?;
        let file_checksum = file
            .checksum
            .clone()
            .ok_or(CatalogError::Incomplete {
                field: "file_checksum",
            })?;

        Ok(Self {
            source_id,
            date: record.date,
            edition_number: record.edition_number.clone(),
            is_extra_edition: record.is_extra_edition,
            power: record.power,
            source_text: record.source_text.clone(),
            scraped_at,
            file_path,
            file_url: file.url.clone(),
            file_checksum,
        })
    }
}

/// A persisted gazette row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Gazette {
    pub id: i64,
    pub source_id: String,
    /// Publication date, `YYYY-MM-DD`.
    pub date: String,
    pub edition_number: Option<String>,
    pub is_extra_edition: bool,
    pub power: String,
    pub source_text: String,
    pub scraped_at: String,
    pub file_path: String,
    pub file_url: String,
    pub file_checksum: String,
    pub created_at: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::record::FileStatus;

    fn record() -> DocumentRecord {
        let mut record: DocumentRecord = serde_json::from_str(
            r#"{"date": "2024-01-05", "power": "executive", "edition_number": "7",
                "source_text": "https://example.com"}"#,
        )
        .unwrap();
        record.source_id = Some("3550308".to_string());
        record.scraped_at = Some("2024-01-06T10:00:00.000000Z".to_string());
        record
    }

    #[test]
    fn test_from_record_copies_record_and_file_fields() {
        let file = FileResult::stored(
            "https://example.com/a.pdf",
            "3550308/2024-01-05/abc.pdf",
            "deadbeef",
            10,
            FileStatus::Downloaded,
        );
        let row = NewGazette::from_record(&record(), &file).unwrap();
        assert_eq!(row.source_id, "3550308");
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(row.edition_number.as_deref(), Some("7"));
        assert_eq!(row.power, Power::Executive);
        assert_eq!(row.file_path, "3550308/2024-01-05/abc.pdf");
        assert_eq!(row.file_url, "https://example.com/a.pdf");
        assert_eq!(row.file_checksum, "deadbeef");
    }

    #[test]
    fn test_from_record_requires_normalized_record() {
        let mut record = record();
        record.scraped_at = None;
        let file = FileResult::stored("u", "p", "c", 1, FileStatus::Downloaded);
        let err = NewGazette::from_record(&record, &file).unwrap_err();
        assert!(matches!(err, CatalogError::Incomplete { field: "scraped_at" }));
    }

    #[test]
    fn test_from_record_requires_stored_file() {
        let file = FileResult::failed("u", "boom");
        let err = NewGazette::from_record(&record(), &file).unwrap_err();
        assert!(matches!(err, CatalogError::Incomplete { field: "file_path" }));
    }
}
