//! Storage names derived from request URLs.
//!
//! A file is stored as `<source_id>/<date>/<sha256(url)>[.<ext>]`, so the same
//! URL always lands on the same path regardless of when it was fetched.

use sha2::{Digest, Sha256};
use url::Url;

/// Extensions kept when they appear at the end of a URL path.
///
/// Anything else (`.php`, `.aspx`, query-driven endpoints) is treated as
/// carrying no extension and goes through content sniffing instead.
const KNOWN_EXTENSIONS: &[&str] = &[
    "7z", "bmp", "bz2", "csv", "doc", "docx", "gif", "gz", "htm", "html", "jpeg", "jpg", "json",
    "odp", "ods", "odt", "pdf", "png", "ppt", "pptx", "rar", "rtf", "tar", "tif", "tiff", "txt",
    "webp", "xls", "xlsx", "xml", "zip",
];

/// Deterministic base name for a URL: the SHA-256 of the URL, lowercase hex.
#[must_use]
pub fn base_name(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

/// Returns the lowercase extension of the URL's last path segment when it is
/// a known file extension.
#[must_use]
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last_segment = parsed.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(last_segment).ok()?;
    let (_, ext) = decoded.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    KNOWN_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Joins the directory part and a file name, appending `ext` when present.
#[must_use]
pub fn relative_path(source_id: &str, date: &str, base: &str, ext: Option<&str>) -> String {
    match ext {
        Some(ext) => format!("{source_id}/{date}/{base}.{ext}"),
        None => format!("{source_id}/{date}/{base}"),
    }
}
