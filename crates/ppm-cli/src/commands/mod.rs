//! Command implementations.

pub mod cache;
pub mod install;
pub mod list;
pub mod uninstall;
pub mod version;

use miette::{IntoDiagnostic, Result};
use ppm_core::config::ProjectConfig;
use ppm_core::paths::ProjectPaths;
use ppm_core::pkg::RegistryClient;
use ppm_core::Config;
use serde::Serialize;

/// A project opened from the working directory.
pub struct Project {
    pub paths: ProjectPaths,
    /// Parsed `ppm.json`, if the project has one.
    pub config: Option<ProjectConfig>,
}

impl Project {
    /// Locate the project root from `config.cwd` and load its `ppm.json`.
    ///
    /// A malformed `ppm.json` is an error; a missing one is not.
    pub fn open(config: &Config) -> Result<Self> {
        let (paths, project_config) = ProjectPaths::open(&config.cwd).into_diagnostic()?;

        tracing::debug!(
            root = %paths.root.display(),
            cache = ?paths.cache_dir,
            "Opened project"
        );

        Ok(Self {
            paths,
            config: project_config,
        })
    }

    /// Registry client honoring `PPM_REGISTRY` and `customSettings.registry`.
    pub fn registry(&self) -> Result<RegistryClient> {
        let configured = self
            .config
            .as_ref()
            .and_then(|c| c.custom_settings.registry.as_deref());
        RegistryClient::from_env(configured).into_diagnostic()
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

/// Build a single-threaded runtime for one command.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()
}
