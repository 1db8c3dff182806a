//! Archive cache.
//!
//! A flat directory of downloaded tarballs, one file per (name, version):
//! `<encoded-name>-<version>.tgz`, where scoped names have `/` replaced by
//! `__`. Entries are written once and never invalidated; a given version's
//! archive does not change upstream.

use super::error::PkgError;
use super::registry::Registry;
use super::tarball::MAX_TARBALL_SIZE;
use futures::StreamExt;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Archive file extension.
const ARCHIVE_EXT: &str = "tgz";

/// Package archive cache.
#[derive(Debug, Clone)]
pub struct PackageCache {
    /// Root directory for the archive cache.
    root: PathBuf,
}

/// A cached archive, as listed by [`PackageCache::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedArchive {
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl PackageCache {
    /// Create a cache rooted at `root`. The directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the archive for a package version.
    #[must_use]
    pub fn path(&self, name: &str, version: &str) -> PathBuf {
        let encoded = Self::encode_name(name);
        self.root.join(format!("{encoded}-{version}.{ARCHIVE_EXT}"))
    }

    /// Check if a package version is already cached.
    #[must_use]
    pub fn has(&self, name: &str, version: &str) -> bool {
        self.path(name, version).is_file()
    }

    /// Download a tarball into the cache and return its path.
    ///
    /// The body is streamed into a temp file in the cache root and renamed
    /// into place once complete. If the stream or a write fails, the temp
    /// file is removed and nothing is left at the final path.
    ///
    /// # Errors
    /// Returns an error if the download fails, exceeds the size limit, or the
    /// cache cannot be written.
    pub async fn fetch_into<R: Registry>(
        &self,
        registry: &R,
        name: &str,
        version: &str,
        tarball_url: &str,
    ) -> Result<PathBuf, PkgError> {
        let dest = self.path(name, version);

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| self.io_error("create cache directory", &e))?;

        // Removed on drop unless persisted
        let temp = tempfile::Builder::new()
            .prefix(".tmp-")
            .suffix(&format!(".{ARCHIVE_EXT}"))
            .tempfile_in(&self.root)
            .map_err(|e| self.io_error("create temp file", &e))?;

        let handle = temp
            .as_file()
            .try_clone()
            .map_err(|e| self.io_error("open temp file", &e))?;
        let mut file = tokio::fs::File::from_std(handle);

        let mut stream = registry.fetch_tarball(tarball_url).await?;
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > MAX_TARBALL_SIZE {
                return Err(PkgError::download_failed(format!(
                    "Tarball too large: more than {MAX_TARBALL_SIZE} bytes"
                )));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| self.io_error("write archive", &e))?;
        }

        file.flush()
            .await
            .map_err(|e| self.io_error("write archive", &e))?;
        file.sync_all()
            .await
            .map_err(|e| self.io_error("sync archive", &e))?;
        drop(file);

        temp.persist(&dest)
            .map_err(|e| self.io_error("store archive", &e.error))?;

        Ok(dest)
    }

    /// List cached archives, sorted by file name.
    ///
    /// # Errors
    /// Returns an error if the cache directory exists but cannot be read.
    pub fn list(&self) -> Result<Vec<CachedArchive>, PkgError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error("read cache directory", &e)),
        };

        let mut archives: Vec<CachedArchive> = entries
            .flatten()
            .filter_map(|entry| {
                let file_name = entry.file_name().to_string_lossy().into_owned();
                let is_archive = !file_name.starts_with('.')
                    && Path::new(&file_name)
                        .extension()
                        .is_some_and(|ext| ext == ARCHIVE_EXT);
                let metadata = entry.metadata().ok().filter(fs::Metadata::is_file)?;
                is_archive.then(|| CachedArchive {
                    file_name,
                    path: entry.path(),
                    size_bytes: metadata.len(),
                })
            })
            .collect();

        archives.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(archives)
    }

    /// Remove every cached archive. Returns the number removed.
    ///
    /// # Errors
    /// Returns an error if an archive cannot be removed.
    pub fn clean(&self) -> Result<usize, PkgError> {
        let archives = self.list()?;
        for archive in &archives {
            fs::remove_file(&archive.path)
                .map_err(|e| self.io_error("remove archive", &e))?;
        }
        Ok(archives.len())
    }

    /// Flatten a package name into a file name component.
    fn encode_name(name: &str) -> String {
        name.replace('/', "__")
    }

    fn io_error(&self, action: &str, e: &io::Error) -> PkgError {
        PkgError::cache_error(format!(
            "Failed to {action} in '{}': {e}",
            self.root.display()
        ))
    }
}
