//! Content-addressable file store partitioned by source and date.
//!
//! Files live under `<root>/<source_id>/<date>/<name>[.<ext>]`, where `name`
//! is derived from the request URL (see [`naming`]). The store never caches
//! what it has seen: every "is it already here" question is answered by the
//! filesystem, so results are the same across process restarts.
//!
//! Downloads are written to a partial file in the target directory and then
//! renamed into place. Two writers racing on the same path both rename a
//! complete file, so the last one wins and no reader sees a torn file.

mod error;
pub mod naming;
pub mod sniff;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

use crate::download::{DownloadedFile, PARTIAL_FILE_PREFIX};

pub use error::StoreError;
pub use sniff::{SNIFF_WINDOW, infer_extension};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;
const HASH_BUFFER_BYTES: usize = 64 * 1024;

/// A file present in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path relative to the store root, `/` separated.
    pub path: String,
    /// SHA-256 of the content, lowercase hex.
    pub checksum: String,
    pub size: u64,
}

/// Filesystem-backed gazette file store.
#[derive(Debug, Clone)]
pub struct FilesStore {
    root: PathBuf,
    expires: Option<Duration>,
}

impl FilesStore {
    /// Creates a store rooted at `root`. Nothing is touched on disk until
    /// [`ensure_root`](Self::ensure_root) or a write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            expires: None,
        }
    }

    /// Treats stored files older than `days` as absent so they get fetched again.
    #[must_use]
    pub fn with_expiry_days(mut self, days: Option<u32>) -> Self {
        self.expires = days.map(|d| Duration::from_secs(u64::from(d) * SECONDS_PER_DAY));
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage path of `url` for one source and date.
    ///
    /// The extension comes from the URL when it names a known file type,
    /// otherwise from the leading content bytes in `head` when given.
    #[must_use]
    pub fn file_path(url: &str, source_id: &str, date: &str, head: Option<&[u8]>) -> String {
        let ext = naming::extension_from_url(url)
            .or_else(|| head.and_then(infer_extension).map(str::to_string));
        naming::relative_path(source_id, date, &naming::base_name(url), ext.as_deref())
    }

    /// Maps a store-relative path onto the filesystem.
    #[must_use]
    pub fn absolute(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Creates the root directory and checks that it is writable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RootUnavailable`] when the directory cannot be
    /// created or written to.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn ensure_root(&self) -> Result<(), StoreError> {
        let unavailable = |source| StoreError::RootUnavailable {
            path: self.root.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(unavailable)?;
        let probe = self.root.join(format!(
            "{PARTIAL_FILE_PREFIX}probe-{:016x}",
            rand::random::<u64>()
        ));
        tokio::fs::write(&probe, b"").await.map_err(unavailable)?;
        let _ = tokio::fs::remove_file(&probe).await;
        Ok(())
    }

    /// Creates the directory holding files of one source and date.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub async fn prepare_dir(&self, source_id: &str, date: &str) -> Result<PathBuf, StoreError> {
        let dir = self.root.join(source_id).join(date);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(dir.clone(), e))?;
        Ok(dir)
    }

    /// Finds the stored file matching `relative`.
    ///
    /// When `relative` has an extension only that exact file counts. Without
    /// one, any `<name>.<ext>` sibling is accepted (first in name order), then
    /// the bare `<name>`. This keeps lookups stable when content sniffing
    /// picked an extension on a previous run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] on filesystem errors other than not-found.
    #[instrument(skip(self))]
    pub async fn find_existing(&self, relative: &str) -> Result<Option<String>, StoreError> {
        let absolute = self.absolute(relative);
        if Path::new(relative).extension().is_some() {
            return match tokio::fs::metadata(&absolute).await {
                Ok(metadata) if metadata.is_file() => Ok(Some(relative.to_string())),
                Ok(_) => Ok(None),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(StoreError::io(absolute, e)),
            };
        }

        let (dir_relative, base) = relative.rsplit_once('/').unwrap_or(("", relative));
        let Some(dir) = absolute.parent() else {
            return Ok(None);
        };
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(dir, e)),
        };

        let prefix = format!("{base}.");
        let mut with_extension = Vec::new();
        let mut bare = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(dir, e))?
        {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name != base && !name.starts_with(&prefix) {
                continue;
            }
            if !entry.file_type().await.is_ok_and(|t| t.is_file()) {
                continue;
            }
            if name == base {
                bare = Some(name.to_string());
            } else {
                with_extension.push(name.to_string());
            }
        }
        with_extension.sort();

        let found = with_extension.into_iter().next().or(bare);
        if let Some(name) = &found {
            debug!(name = %name, "found stored file");
        }
        Ok(found.map(|name| {
            if dir_relative.is_empty() {
                name
            } else {
                format!("{dir_relative}/{name}")
            }
        }))
    }

    /// Reads checksum and size of a stored file.
    ///
    /// Returns `None` when the file is missing or older than the configured
    /// expiry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the file exists but cannot be read.
    #[instrument(skip(self))]
    pub async fn stat_file(&self, relative: &str) -> Result<Option<StoredFile>, StoreError> {
        let absolute = self.absolute(relative);
        let metadata = match tokio::fs::metadata(&absolute).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(absolute, e)),
        };

        if let Some(expires) = self.expires {
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| modified.elapsed().ok());
            if age.is_some_and(|age| age > expires) {
                debug!(path = relative, "stored file expired");
                return Ok(None);
            }
        }

        let checksum = checksum_file(&absolute).await?;
        Ok(Some(StoredFile {
            path: relative.to_string(),
            checksum,
            size: metadata.len(),
        }))
    }

    /// Moves a finished download to `relative`, replacing any file there.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the rename fails. The partial file is
    /// removed in that case.
    #[instrument(skip(self, download), fields(temp = %download.temp_path.display()))]
    pub async fn persist(
        &self,
        download: &DownloadedFile,
        relative: &str,
    ) -> Result<StoredFile, StoreError> {
        let target = self.absolute(relative);
        if let Err(e) = tokio::fs::rename(&download.temp_path, &target).await {
            self.discard(download).await;
            return Err(StoreError::io(target, e));
        }
        Ok(StoredFile {
            path: relative.to_string(),
            checksum: download.checksum.clone(),
            size: download.size,
        })
    }

    /// Removes the partial file of an abandoned download.
    pub async fn discard(&self, download: &DownloadedFile) {
        if let Err(e) = tokio::fs::remove_file(&download.temp_path).await
            && e.kind() != ErrorKind::NotFound
        {
            debug!(path = %download.temp_path.display(), error = %e, "failed to remove partial file");
        }
    }
}

async fn checksum_file(path: &Path) -> Result<String, StoreError> {
    let mut file = File::open(path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_BYTES];
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|e| StoreError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
