//! User-Agent sent with gazette file downloads.

/// Default User-Agent for download requests (identifies the tool).
#[must_use]
pub(crate) fn default_download_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("gazette/{version} (public-gazette-collector)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_carries_crate_version() {
        let ua = default_download_user_agent();
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("gazette/")
                .and_then(|s| s.split(' ').next())
                .expect("UA has version"),
        );
        assert!(ua.contains("public-gazette-collector"), "{ua}");
    }
}
