use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Project config filename.
pub const PROJECT_CONFIG_NAME: &str = "ppm.json";

/// Runtime configuration for the ppm CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = WARN, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

/// Contents of `ppm.json`.
///
/// Every field is optional. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Top-level dependencies (name -> range) installed by a bare `ppm install`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub custom_settings: CustomSettings,
}

/// The `customSettings` section of `ppm.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSettings {
    /// Archive cache directory. Relative paths are resolved against the
    /// project root. Absent disables the content cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_directory: Option<PathBuf>,

    /// Registry base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
}

impl ProjectConfig {
    /// Read `ppm.json` from an explicit path.
    ///
    /// # Errors
    /// Returns `ConfigNotFound` if the file is missing, `ConfigParse` if it is
    /// not valid JSON for this schema.
    pub fn read_from(path: &Path) -> Result<Self, Error> {
        let content = ppm_util::fs::read_to_string_lossy(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::ConfigNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Error::ConfigRead {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        serde_json::from_str(&content).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `ppm.json` from a project root, if present.
    ///
    /// A missing file is not an error. A malformed file is.
    pub fn load(root: &Path) -> Result<Option<Self>, Error> {
        match Self::read_from(&root.join(PROJECT_CONFIG_NAME)) {
            Ok(config) => Ok(Some(config)),
            Err(Error::ConfigNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Package specifiers for the declared dependencies, sorted by name.
    ///
    /// Empty ranges become bare names (latest).
    #[must_use]
    pub fn dependency_specs(&self) -> Vec<String> {
        self.dependencies
            .iter()
            .map(|(name, range)| {
                let range = range.trim();
                if range.is_empty() {
                    name.clone()
                } else {
                    format!("{name}@{range}")
                }
            })
            .collect()
    }
}
