//! File type detection from leading content bytes.
//!
//! Matching is delegated to `infer`. Text matchers (HTML, XML, shell
//! scripts) are ignored: portals answer with HTML error pages often enough
//! that a `.html` guess is worse than no extension.

use infer::MatcherType;

/// Number of leading bytes inspected.
pub const SNIFF_WINDOW: usize = 261;

/// Infers a file extension from the leading bytes of a file.
///
/// Only the first [`SNIFF_WINDOW`] bytes are considered. Returns `None` for
/// unrecognized content, including plain text and HTML.
#[must_use]
pub fn infer_extension(content: &[u8]) -> Option<&'static str> {
    let head = &content[..content.len().min(SNIFF_WINDOW)];
    infer::get(head)
        .filter(|kind| kind.matcher_type() != MatcherType::Text)
        .map(|kind| kind.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_is_detected() {
        assert_eq!(infer_extension(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3"), Some("pdf"));
    }

    #[test]
    fn test_unrecognized_bytes_have_no_extension() {
        assert_eq!(infer_extension(b"<!DOCTYPE html><html></html>"), None);
        assert_eq!(infer_extension(b"<?xml version=\"1.0\"?><diario/>"), None);
        assert_eq!(infer_extension(b"plain text gazette"), None);
        assert_eq!(infer_extension(b""), None);
    }

    #[test]
    fn test_image_signatures() {
        assert_eq!(
            infer_extension(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0]),
            Some("png")
        );
        assert_eq!(infer_extension(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("jpg"));
        assert_eq!(infer_extension(b"GIF89a...."), Some("gif"));
    }

    #[test]
    fn test_large_pdf_is_detected_from_its_head() {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.resize(SNIFF_WINDOW * 4, b' ');
        assert_eq!(infer_extension(&bytes), Some("pdf"));
    }

    #[test]
    fn test_signature_past_the_window_is_ignored() {
        let mut bytes = vec![b' '; SNIFF_WINDOW];
        bytes.extend_from_slice(b"%PDF-1.4");
        assert_eq!(infer_extension(&bytes), None);
    }
}
