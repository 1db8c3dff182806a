use crate::config::{ProjectConfig, PROJECT_CONFIG_NAME};
use crate::error::Error;
use crate::pkg::lockfile::LOCKFILE_NAME;
use std::path::{Path, PathBuf};

/// Name of the module directory under the project root.
pub const MODULES_DIR_NAME: &str = "node_modules";

/// Find the project root by walking up from `cwd` looking for `ppm.json` or the lock file.
///
/// Returns the first directory containing either marker, or `None` if neither is found.
#[must_use]
pub fn project_root(cwd: &Path) -> Option<PathBuf> {
    let mut current = cwd.to_path_buf();

    loop {
        if current.join(PROJECT_CONFIG_NAME).exists() || current.join(LOCKFILE_NAME).exists() {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Resolved on-disk layout of a project.
///
/// Built once at the entry point and passed into the install engine so that
/// nothing below it looks up configuration on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    /// Project root directory.
    pub root: PathBuf,
    /// `node_modules` directory.
    pub modules_dir: PathBuf,
    /// Lock file path.
    pub lock_path: PathBuf,
    /// Archive cache directory, `None` when caching is disabled.
    pub cache_dir: Option<PathBuf>,
}

impl ProjectPaths {
    /// Layout rooted at `root` with caching disabled.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            modules_dir: root.join(MODULES_DIR_NAME),
            lock_path: root.join(LOCKFILE_NAME),
            cache_dir: None,
            root,
        }
    }

    /// Set the cache directory. Relative paths are resolved against the root.
    #[must_use]
    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.cache_dir = cache_dir.map(|dir| {
            if dir.is_absolute() {
                dir
            } else {
                self.root.join(dir)
            }
        });
        self
    }

    /// Layout for a project, taking the cache directory from its config.
    #[must_use]
    pub fn from_config(root: impl Into<PathBuf>, config: Option<&ProjectConfig>) -> Self {
        let cache_dir = config.and_then(|c| c.custom_settings.cache_directory.clone());
        Self::new(root).with_cache_dir(cache_dir)
    }

    /// Discover the project root from a working directory, caching disabled.
    ///
    /// The root is the nearest ancestor holding `ppm.json` or the lock file,
    /// else `cwd` itself.
    #[must_use]
    pub fn discover(cwd: &Path) -> Self {
        let cwd = dunce::canonicalize(cwd).unwrap_or_else(|_| cwd.to_path_buf());
        let root = project_root(&cwd).unwrap_or(cwd);
        Self::new(root)
    }

    /// Open the project containing `cwd`.
    ///
    /// Loads `ppm.json` from the discovered root and applies its cache
    /// directory.
    ///
    /// # Errors
    /// Returns an error if `ppm.json` exists but cannot be read or parsed.
    pub fn open(cwd: &Path) -> Result<(Self, Option<ProjectConfig>), Error> {
        let root = Self::discover(cwd).root;
        let config = ProjectConfig::load(&root)?;
        Ok((Self::from_config(root, config.as_ref()), config))
    }

    /// Installed directory of a package (`node_modules/<name>`).
    ///
    /// Scoped names nest under their scope directory.
    #[must_use]
    pub fn package_dir(&self, name: &str) -> PathBuf {
        let mut dir = self.modules_dir.clone();
        for part in name.split('/') {
            dir.push(part);
        }
        dir
    }
}
