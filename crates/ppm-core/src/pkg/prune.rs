//! Uninstall, prune and listing of installed packages.

use super::error::PkgError;
use super::lockfile::Lockfile;
use super::spec::PackageSpec;
use crate::paths::ProjectPaths;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of [`uninstall`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UninstallReport {
    pub name: String,
    /// Whether the package had a directory or lock entry to remove.
    pub removed: bool,
    /// Module directories removed because no lock entry names them.
    pub pruned: Vec<String>,
}

/// An entry of the lock, as shown by [`list_installed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedPackage {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    /// The module directory exists.
    pub installed: bool,
    pub size_bytes: u64,
}

/// Remove a package, its lock entry, and every module directory the lock no
/// longer names.
///
/// # Errors
/// Returns an error if `name` is invalid, the lock cannot be read or written,
/// or a directory cannot be removed.
pub fn uninstall(paths: &ProjectPaths, name: &str) -> Result<UninstallReport, PkgError> {
    let spec = PackageSpec::latest(name)?;

    let removed_dir = remove_dir(&paths.package_dir(&spec.name))?;
    let removed_lock = Lockfile::remove(&paths.lock_path, &spec.name)?;

    let lock = Lockfile::load(&paths.lock_path)?;
    let pruned = prune_modules(&paths.modules_dir, &lock)?;

    info!(
        name = %spec.name,
        removed = removed_dir || removed_lock,
        pruned = pruned.len(),
        "Uninstall completed"
    );

    Ok(UninstallReport {
        name: spec.name,
        removed: removed_dir || removed_lock,
        pruned,
    })
}

/// Remove every package directory under `modules_dir` that `lock` does not
/// name. Returns the removed package names, sorted.
///
/// Directories under an `@scope` are checked as `@scope/name`; a scope
/// directory left empty is removed as well. Dot-entries (such as `.bin`) and
/// plain files are left alone.
///
/// # Errors
/// Returns an error if a directory cannot be read or removed.
pub fn prune_modules(modules_dir: &Path, lock: &Lockfile) -> Result<Vec<String>, PkgError> {
    let mut pruned = Vec::new();

    for (entry_name, path) in subdirs(modules_dir)? {
        if entry_name.starts_with('.') {
            continue;
        }

        if entry_name.starts_with('@') {
            for (inner, inner_path) in subdirs(&path)? {
                let full = format!("{entry_name}/{inner}");
                if !lock.contains(&full) {
                    remove_dir(&inner_path)?;
                    debug!(name = %full, "Pruned package");
                    pruned.push(full);
                }
            }

            let empty = fs::read_dir(&path)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if empty {
                fs::remove_dir(&path).map_err(|e| remove_failed(&path, &e))?;
            }
        } else if !lock.contains(&entry_name) {
            remove_dir(&path)?;
            debug!(name = %entry_name, "Pruned package");
            pruned.push(entry_name);
        }
    }

    pruned.sort();
    Ok(pruned)
}

/// Lock entries with their on-disk state, sorted by name.
///
/// # Errors
/// Returns an error if the lock cannot be read.
pub fn list_installed(paths: &ProjectPaths) -> Result<Vec<ListedPackage>, PkgError> {
    let lock = Lockfile::load(&paths.lock_path)?;

    Ok(lock
        .dependencies
        .into_iter()
        .map(|(name, version)| {
            let path = paths.package_dir(&name);
            let installed = path.is_dir();
            let size_bytes = if installed {
                ppm_util::fs::dir_size(&path)
            } else {
                0
            };
            ListedPackage {
                name,
                version,
                path,
                installed,
                size_bytes,
            }
        })
        .collect())
}

/// Directory entries of `dir` that are directories, as (name, path).
fn subdirs(dir: &Path) -> Result<Vec<(String, PathBuf)>, PkgError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(PkgError::node_modules_write_failed(format!(
                "Failed to read '{}': {e}",
                dir.display()
            )))
        }
    };

    let mut dirs: Vec<(String, PathBuf)> = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn remove_dir(path: &Path) -> Result<bool, PkgError> {
    ppm_util::fs::remove_dir_all_if_exists(path).map_err(|e| remove_failed(path, &e))
}

fn remove_failed(path: &Path, e: &io::Error) -> PkgError {
    PkgError::node_modules_write_failed(format!("Failed to remove '{}': {e}", path.display()))
}
