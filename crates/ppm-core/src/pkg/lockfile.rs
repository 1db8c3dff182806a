//! Lock file store.
//!
//! The lock file records the exact version installed for every package in
//! `node_modules`. It is a single flat map:
//!
//! ```json
//! {
//!   "dependencies": {
//!     "left-pad": "1.3.0"
//!   }
//! }
//! ```
//!
//! Every mutation rewrites the whole file. A single writer per project is
//! assumed.

use super::error::PkgError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

/// Lockfile filename.
pub const LOCKFILE_NAME: &str = "prisma.lock";

/// In-memory lock file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    /// Installed package name -> exact version. Sorted for stable output.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl Lockfile {
    /// Load the lock file at `path`. A missing file is an empty lock.
    ///
    /// # Errors
    /// Returns `PKG_LOCK_INVALID_JSON` if the file exists but cannot be read
    /// or does not have the expected shape.
    pub fn load(path: &Path) -> Result<Self, PkgError> {
        let content = match ppm_util::fs::read_to_string_lossy(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(PkgError::lock_invalid(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            PkgError::lock_invalid(format!("Invalid lock file {}: {e}", path.display()))
        })
    }

    /// Write the lock file atomically, pretty-printed with a trailing newline.
    ///
    /// # Errors
    /// Returns `PKG_LOCK_WRITE_FAILED` if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), PkgError> {
        let mut content = serde_json::to_string_pretty(self).map_err(|e| {
            PkgError::lock_write_failed(format!("Failed to serialize lock file: {e}"))
        })?;
        content.push('\n');

        ppm_util::fs::atomic_write(path, content.as_bytes()).map_err(|e| {
            PkgError::lock_write_failed(format!("Failed to write {}: {e}", path.display()))
        })
    }

    /// Drop `name` from the lock file at `path` and persist.
    ///
    /// Returns whether an entry was removed. The file is not rewritten when
    /// there was nothing to remove.
    ///
    /// # Errors
    /// Returns an error if the lock cannot be loaded or saved.
    pub fn remove(path: &Path, name: &str) -> Result<bool, PkgError> {
        let mut lock = Self::load(path)?;
        if lock.dependencies.remove(name).is_none() {
            return Ok(false);
        }
        lock.save(path)?;
        Ok(true)
    }

    /// Locked version of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.dependencies.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }

    /// Record `name` at `version`, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, version: impl Into<String>) {
        self.dependencies.insert(name.into(), version.into());
    }

    /// Locked package names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.dependencies.keys().cloned().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}
