//! Gazette records and the file descriptors attached to them.
//!
//! A [`DocumentRecord`] is one gazette issue discovered by a crawler. It is
//! mutated in place as it moves through the pipeline stages and dropped once
//! the metadata sink is done with it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};

/// Branch of government that issued a gazette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Power {
    Executive,
    Legislative,
    ExecutiveLegislative,
}

impl Power {
    /// Returns the database representation of this power.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executive => "executive",
            Self::Legislative => "legislative",
            Self::ExecutiveLegislative => "executive_legislative",
        }
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered gazette issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Identifier of the publishing source (territory). Set by the normalizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Publication date. Serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    #[serde(default)]
    pub edition_number: Option<String>,
    #[serde(default)]
    pub is_extra_edition: bool,
    pub power: Power,
    /// Page text or URL the crawler extracted the record from.
    #[serde(default)]
    pub source_text: String,
    /// Plain file URLs; per-source extra headers apply to these.
    #[serde(default)]
    pub file_urls: Vec<String>,
    /// Ready-made fetch requests, used as-is.
    #[serde(default)]
    pub file_requests: Vec<FileRequest>,
    /// One result per file reference, filled by the content store.
    #[serde(default)]
    pub files: Vec<FileResult>,
    /// Canonical scrape timestamp. Set by the normalizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<String>,
}

impl DocumentRecord {
    /// Returns every file reference of this record, URLs first.
    #[must_use]
    pub fn file_references(&self) -> Vec<FileReference> {
        self.file_urls
            .iter()
            .cloned()
            .map(FileReference::Url)
            .chain(self.file_requests.iter().cloned().map(FileReference::Request))
            .collect()
    }

    /// Canonical textual form of the publication date.
    #[must_use]
    pub fn date_text(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Number of results with the given status.
    #[must_use]
    pub fn count_files(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|f| f.status == status).count()
    }
}

/// A remote file attached to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileReference {
    Url(String),
    Request(FileRequest),
}

impl FileReference {
    /// URL the reference points at. This is what storage names derive from.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::Request(request) => &request.url,
        }
    }
}

/// A pre-built fetch request.
///
/// Deserializes from either a structured object or the `"METHOD URL"` form
/// it serializes to, so processed items can be fed back in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawFileRequest")]
pub struct FileRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl FileRequest {
    /// Creates a GET request with no extra headers.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }
}

impl fmt::Display for FileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

impl Serialize for FileRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFileRequest {
    Described(String),
    Structured {
        #[serde(default = "default_method")]
        method: String,
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default)]
        body: Option<String>,
    },
}

fn default_method() -> String {
    "GET".to_string()
}

impl TryFrom<RawFileRequest> for FileRequest {
    type Error = String;

    fn try_from(raw: RawFileRequest) -> Result<Self, Self::Error> {
        match raw {
            RawFileRequest::Described(text) => {
                let Some((method, url)) = text.trim().split_once(' ') else {
                    return Err(format!("expected \"METHOD URL\", got {text:?}"));
                };
                let url = url.trim();
                if method.is_empty() || url.is_empty() {
                    return Err(format!("expected \"METHOD URL\", got {text:?}"));
                }
                Ok(Self {
                    method: method.to_ascii_uppercase(),
                    url: url.to_string(),
                    headers: BTreeMap::new(),
                    body: None,
                })
            }
            RawFileRequest::Structured {
                method,
                url,
                headers,
                body,
            } => Ok(Self {
                method: method.to_ascii_uppercase(),
                url,
                headers,
                body,
            }),
        }
    }
}

/// Outcome of resolving one file reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Fetched in this run and written to the store.
    Downloaded,
    /// A file already existed at the resolved path; nothing was fetched.
    AlreadyPresent,
    /// Fetch or write failed.
    Failed,
}

impl FileStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Downloaded => "downloaded",
            Self::AlreadyPresent => "already_present",
            Self::Failed => "failed",
        }
    }
}

/// Result of resolving one [`FileReference`] into a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResult {
    pub url: String,
    /// Storage path relative to the store root, `/` separated.
    #[serde(default)]
    pub path: Option<String>,
    /// SHA-256 of the file content, lowercase hex.
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    pub status: FileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileResult {
    #[must_use]
    pub fn stored(
        url: impl Into<String>,
        path: impl Into<String>,
        checksum: impl Into<String>,
        size: u64,
        status: FileStatus,
    ) -> Self {
        Self {
            url: url.into(),
            path: Some(path.into()),
            checksum: Some(checksum.into()),
            size: Some(size),
            status,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: None,
            checksum: None,
            size: None,
            status: FileStatus::Failed,
            error: Some(error.into()),
        }
    }
}
