//! JSON-lines record feed.
//!
//! Crawlers emit one [`DocumentRecord`] per line. Blank lines are ignored and
//! malformed lines are logged and skipped so one bad record does not stop a
//! run.

use futures_util::Stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::warn;

use crate::record::DocumentRecord;

/// Reads records lazily from `reader`, one JSON document per line.
pub fn read_records<R>(reader: R) -> impl Stream<Item = DocumentRecord>
where
    R: AsyncBufRead + Unpin,
{
    futures_util::stream::unfold((reader.lines(), 0usize), |(lines, line_no)| {
        next_record(lines, line_no)
    })
}

async fn next_record<R>(
    mut lines: Lines<R>,
    mut line_no: usize,
) -> Option<(DocumentRecord, (Lines<R>, usize))>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        line_no += 1;
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return None,
            Err(e) => {
                warn!(line = line_no, error = %e, "failed to read input, stopping");
                return None;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => return Some((record, (lines, line_no))),
            Err(e) => warn!(line = line_no, error = %e, "skipping malformed record"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    #[tokio::test]
    async fn test_reads_records_skipping_blank_and_malformed_lines() {
        let input = concat!(
            r#"{"date": "2024-01-05", "power": "executive"}"#,
            "\n\n",
            "not json\n",
            r#"{"date": "2024-01-06", "power": "legislative", "file_urls": ["https://example.com/a.pdf"]}"#,
            "\n",
        );

        let records: Vec<_> = read_records(input.as_bytes()).collect().await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date_text(), "2024-01-05");
        assert_eq!(records[1].file_urls, vec!["https://example.com/a.pdf"]);
    }

    #[tokio::test]
    async fn test_last_line_without_newline_is_read() {
        let input = r#"{"date": "2024-01-05", "power": "executive"}"#;
        let records: Vec<_> = read_records(input.as_bytes()).collect().await;
        assert_eq!(records.len(), 1);
    }
}
