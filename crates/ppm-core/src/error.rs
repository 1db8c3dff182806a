use std::path::PathBuf;
use thiserror::Error;

/// Core error type for ppm operations outside the install engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Project config not found: {path}")]
    ConfigNotFound { path: PathBuf },
}
