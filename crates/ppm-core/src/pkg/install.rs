//! Install engine.
//!
//! Walks a package and its transitive dependencies depth-first, fetching,
//! extracting and locking each one. The walk uses an explicit stack; the
//! visiting order is the same as inline recursion (a dependency's own
//! dependencies are handled before its next sibling).
//!
//! A failure installing one package only ends that branch. Failures are
//! collected into the returned [`InstallReport`] and the caller decides how
//! to surface them.

use super::cache::PackageCache;
use super::deps::{read_package_deps, MANIFEST_NAME};
use super::error::PkgError;
use super::lockfile::Lockfile;
use super::registry::Registry;
use super::spec::{PackageSpec, LATEST_TAG};
use super::tarball::{extract_tgz_file, extract_tgz_stream, MAX_TARBALL_SIZE};
use super::version::{is_plain_version, resolve_version};
use crate::paths::ProjectPaths;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// A package extracted into `node_modules` during this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    /// 0 for a requested package, 1 for its dependencies, and so on.
    pub depth: usize,
    /// The archive came from the content cache rather than the network.
    pub from_cache: bool,
}

/// A package skipped because the lock already records it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockedPackage {
    pub name: String,
    pub version: String,
    pub depth: usize,
}

/// A branch that could not be installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallFailure {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    pub depth: usize,
    pub error: PkgError,
}

/// Counters over an [`InstallReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InstallSummary {
    pub installed: usize,
    pub downloaded: usize,
    pub cached: usize,
    pub already_locked: usize,
    pub failed: usize,
}

/// Result of one or more top-level installs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub installed: Vec<InstalledPackage>,
    pub locked: Vec<LockedPackage>,
    pub failures: Vec<InstallFailure>,
}

impl InstallReport {
    /// Whether a requested (depth 0) package failed.
    #[must_use]
    pub fn root_failed(&self) -> bool {
        self.failures.iter().any(|f| f.depth == 0)
    }

    /// Failures below the requested packages.
    pub fn transitive_failures(&self) -> impl Iterator<Item = &InstallFailure> {
        self.failures.iter().filter(|f| f.depth > 0)
    }

    #[must_use]
    pub fn summary(&self) -> InstallSummary {
        let cached = self.installed.iter().filter(|p| p.from_cache).count();
        InstallSummary {
            installed: self.installed.len(),
            downloaded: self.installed.len() - cached,
            cached,
            already_locked: self.locked.len(),
            failed: self.failures.len(),
        }
    }

    /// Append another report's entries to this one.
    pub fn merge(&mut self, other: InstallReport) {
        self.installed.extend(other.installed);
        self.locked.extend(other.locked);
        self.failures.extend(other.failures);
    }
}

/// A package waiting to be visited.
#[derive(Debug)]
struct Pending {
    name: String,
    range: Option<String>,
    depth: usize,
}

/// Install engine bound to a registry and a project layout.
pub struct Installer<'a, R: Registry> {
    registry: &'a R,
    paths: &'a ProjectPaths,
    cache: Option<PackageCache>,
}

impl<'a, R: Registry> Installer<'a, R> {
    /// Create an installer. Caching is enabled when `paths.cache_dir` is set.
    #[must_use]
    pub fn new(registry: &'a R, paths: &'a ProjectPaths) -> Self {
        Self {
            registry,
            paths,
            cache: paths.cache_dir.clone().map(PackageCache::new),
        }
    }

    /// Install one specifier and its dependencies.
    ///
    /// # Errors
    /// Returns an error only if the lock file cannot be loaded. Per-package
    /// failures are reported in the [`InstallReport`].
    pub async fn install(&self, spec: &str) -> Result<InstallReport, PkgError> {
        self.install_all(&[spec]).await
    }

    /// Install several specifiers in order, each with its own session.
    ///
    /// # Errors
    /// Returns an error only if the lock file cannot be loaded.
    pub async fn install_all<S: AsRef<str>>(&self, specs: &[S]) -> Result<InstallReport, PkgError> {
        let mut lock = Lockfile::load(&self.paths.lock_path)?;
        let mut report = InstallReport::default();

        for spec in specs {
            let spec = spec.as_ref();
            let root = match PackageSpec::parse(spec) {
                Ok(parsed) => Pending {
                    range: parsed.effective_range().map(String::from),
                    name: parsed.name,
                    depth: 0,
                },
                Err(error) => {
                    debug!(spec, error = %error, "Invalid package spec");
                    report.failures.push(InstallFailure {
                        name: spec.to_string(),
                        range: None,
                        depth: 0,
                        error,
                    });
                    continue;
                }
            };

            let before = report.summary();
            self.walk(root, &mut lock, &mut report).await;
            let after = report.summary();

            info!(
                spec,
                installed = after.installed - before.installed,
                cached = after.cached - before.cached,
                already_locked = after.already_locked - before.already_locked,
                failed = after.failed - before.failed,
                "Install completed"
            );
        }

        Ok(report)
    }

    /// Reinstall `name` at its latest version.
    ///
    /// Removes the installed directory and lock entry first, so the lock no
    /// longer short-circuits the install.
    ///
    /// # Errors
    /// Returns an error if `name` is not a bare package name, or the old
    /// installation cannot be removed.
    pub async fn update(&self, name: &str) -> Result<InstallReport, PkgError> {
        let spec = PackageSpec::latest(name)?;

        let dir = self.paths.package_dir(&spec.name);
        ppm_util::fs::remove_dir_all_if_exists(&dir).map_err(|e| {
            PkgError::node_modules_write_failed(format!(
                "Failed to remove '{}': {e}",
                dir.display()
            ))
        })?;
        Lockfile::remove(&self.paths.lock_path, &spec.name)?;

        debug!(name = %spec.name, "Removed for update");
        self.install(&spec.name).await
    }

    /// Update every package currently in the lock, one at a time.
    ///
    /// # Errors
    /// Returns an error if the lock cannot be loaded or an update fails fatally.
    pub async fn upgrade(&self) -> Result<InstallReport, PkgError> {
        let names = Lockfile::load(&self.paths.lock_path)?.names();
        let mut report = InstallReport::default();

        for name in names {
            report.merge(self.update(&name).await?);
        }

        Ok(report)
    }

    async fn walk(&self, root: Pending, lock: &mut Lockfile, report: &mut InstallReport) {
        let mut session: HashSet<String> = HashSet::new();
        let mut stack = vec![root];

        while let Some(item) = stack.pop() {
            // Queued twice before the first copy was installed
            if session.contains(&item.name) {
                continue;
            }

            if let Some(version) = lock.get(&item.name) {
                debug!(name = %item.name, version, depth = item.depth, "Already locked");
                session.insert(item.name.clone());
                report.locked.push(LockedPackage {
                    name: item.name,
                    version: version.to_string(),
                    depth: item.depth,
                });
                continue;
            }

            match self.install_one(&item, lock).await {
                Ok(installed) => {
                    session.insert(installed.name.clone());
                    let depth = item.depth + 1;
                    let mut queued = Vec::new();

                    for (name, range) in self.dependencies_of(&installed.name) {
                        if session.contains(&name) {
                            continue;
                        }
                        let range = Some(range)
                            .filter(|r| !r.trim().is_empty() && r.as_str() != LATEST_TAG);

                        // Manifest names become paths under node_modules
                        if let Err(error) = PackageSpec::validate_package_name(&name) {
                            debug!(
                                package = %installed.name,
                                dependency = %name,
                                error = %error,
                                "Invalid dependency name"
                            );
                            report.failures.push(InstallFailure {
                                name,
                                range,
                                depth,
                                error,
                            });
                            continue;
                        }

                        queued.push(Pending { name, range, depth });
                    }

                    report.installed.push(installed);

                    // Reverse so the first dependency is popped first
                    stack.extend(queued.into_iter().rev());
                }
                Err(error) => {
                    debug!(
                        name = %item.name,
                        range = ?item.range,
                        depth = item.depth,
                        error = %error,
                        "Failed to install package"
                    );
                    report.failures.push(InstallFailure {
                        name: item.name,
                        range: item.range,
                        depth: item.depth,
                        error,
                    });
                }
            }
        }
    }

    /// Fetch, extract and lock a single package.
    async fn install_one(
        &self,
        item: &Pending,
        lock: &mut Lockfile,
    ) -> Result<InstalledPackage, PkgError> {
        let name = item.name.as_str();
        debug!(name, range = ?item.range, depth = item.depth, "Adding package");

        let metadata = self.registry.fetch_metadata(name).await?;
        let version = resolve_version(name, item.range.as_deref(), &metadata)?;

        // The version is part of the cache file name
        if !is_plain_version(&version) {
            return Err(PkgError::registry(format!(
                "Registry returned an unusable version for {name}: '{version}'"
            )));
        }

        debug!(name, version = %version, "Resolved version");

        let tarball_url = metadata.tarball_url(&version).ok_or_else(|| {
            PkgError::download_failed(format!("No tarball URL for {name}@{version}"))
        })?;

        let dest = self.paths.package_dir(name);
        let from_cache = self.materialize(name, &version, tarball_url, dest).await?;

        lock.insert(name, version.as_str());
        if let Err(e) = lock.save(&self.paths.lock_path) {
            lock.dependencies.remove(name);
            return Err(e);
        }

        info!(name, version = %version, depth = item.depth, from_cache, "Installed package");

        Ok(InstalledPackage {
            name: name.to_string(),
            version,
            depth: item.depth,
            from_cache,
        })
    }

    /// Get the archive and extract it into `dest`. Returns whether the archive
    /// was already cached.
    async fn materialize(
        &self,
        name: &str,
        version: &str,
        tarball_url: &str,
        dest: PathBuf,
    ) -> Result<bool, PkgError> {
        let Some(cache) = &self.cache else {
            debug!(url = %tarball_url, "Downloading tarball");
            let stream = self.registry.fetch_tarball(tarball_url).await?;
            let files = extract_tgz_stream(stream, dest, MAX_TARBALL_SIZE).await?;
            debug!(files, "Extracted downloaded tarball");
            return Ok(false);
        };

        let from_cache = cache.has(name, version);
        let archive = if from_cache {
            let path = cache.path(name, version);
            debug!(path = %path.display(), "Using cached archive");
            path
        } else {
            debug!(url = %tarball_url, "Downloading tarball into cache");
            cache
                .fetch_into(self.registry, name, version, tarball_url)
                .await?
        };

        run_blocking(move || extract_tgz_file(&archive, &dest)).await?;
        Ok(from_cache)
    }

    /// Dependencies declared by an installed package's manifest.
    fn dependencies_of(&self, name: &str) -> Vec<(String, String)> {
        let manifest = self.paths.package_dir(name).join(MANIFEST_NAME);

        match read_package_deps(&manifest) {
            Ok(deps) => {
                for e in &deps.errors {
                    warn!(package = name, dependency = %e.name, code = e.code, "{}", e.message);
                }
                deps.deps
            }
            Err(e) => {
                warn!(package = name, error = %e, "Skipping dependencies of package");
                Vec::new()
            }
        }
    }
}

/// Run file extraction off the async executor.
async fn run_blocking<F>(f: F) -> Result<usize, PkgError>
where
    F: FnOnce() -> Result<usize, PkgError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PkgError::extract_failed(format!("Extraction task failed: {e}")))?
}
