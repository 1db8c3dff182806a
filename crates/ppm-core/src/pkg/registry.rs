//! Registry client.
//!
//! The install engine talks to the registry through the [`Registry`] trait;
//! [`RegistryClient`] is the HTTP implementation.

use super::error::PkgError;
use super::spec::url_encoded_name;
use super::tarball::MAX_TARBALL_SIZE;
use crate::version::USER_AGENT;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Default registry URL.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// Environment variable to override registry URL.
pub const REGISTRY_ENV: &str = "PPM_REGISTRY";

/// Connect timeout for every request.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Total timeout for a metadata request.
const METADATA_TIMEOUT_SECS: u64 = 15;

/// Total timeout for a tarball download.
const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// A tarball response body.
pub type ByteStream = BoxStream<'static, Result<Bytes, PkgError>>;

/// Package metadata as served by the registry.
///
/// Only the fields the installer reads are modelled; everything else in the
/// document is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub versions: BTreeMap<String, VersionMetadata>,
}

/// One published version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist: Option<Dist>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
}

/// Distribution info for a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dist {
    pub tarball: String,
}

impl RegistryMetadata {
    /// Tarball URL for a specific version.
    #[must_use]
    pub fn tarball_url(&self, version: &str) -> Option<&str> {
        self.versions
            .get(version)?
            .dist
            .as_ref()
            .map(|dist| dist.tarball.as_str())
    }

    /// All published version strings.
    #[must_use]
    pub fn version_keys(&self) -> Vec<&str> {
        self.versions.keys().map(String::as_str).collect()
    }
}

/// Source of package metadata and archives.
#[allow(async_fn_in_trait)]
pub trait Registry {
    /// Fetch metadata for a package.
    ///
    /// A missing package is reported as `PKG_NOT_FOUND`.
    async fn fetch_metadata(&self, name: &str) -> Result<RegistryMetadata, PkgError>;

    /// Open a tarball download.
    async fn fetch_tarball(&self, url: &str) -> Result<ByteStream, PkgError>;
}

/// HTTP registry client.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: Url,
    http: Client,
}

impl RegistryClient {
    /// Create a new registry client with the given base URL.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn new(base_url: &str) -> Result<Self, PkgError> {
        // Without a trailing slash, join() would replace the last path segment
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };

        let base_url = Url::parse(&normalized)
            .map_err(|e| PkgError::registry(format!("Invalid registry URL '{base_url}': {e}")))?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PkgError::registry(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { base_url, http })
    }

    /// Create a client using `PPM_REGISTRY`, else `configured`, else the default registry.
    ///
    /// # Errors
    /// Returns an error if the client cannot be created.
    pub fn from_env(configured: Option<&str>) -> Result<Self, PkgError> {
        let url = std::env::var(REGISTRY_ENV)
            .ok()
            .or_else(|| configured.map(String::from))
            .unwrap_or_else(|| DEFAULT_REGISTRY.to_string());
        Self::new(&url)
    }

    fn metadata_url(&self, name: &str) -> Result<Url, PkgError> {
        self.base_url
            .join(&url_encoded_name(name))
            .map_err(|e| PkgError::registry(format!("Failed to build URL for '{name}': {e}")))
    }
}

impl Registry for RegistryClient {
    async fn fetch_metadata(&self, name: &str) -> Result<RegistryMetadata, PkgError> {
        let url = self.metadata_url(name)?;

        let response = self
            .http
            .get(url.as_str())
            .timeout(Duration::from_secs(METADATA_TIMEOUT_SECS))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PkgError::not_found(name));
        }

        if !response.status().is_success() {
            return Err(PkgError::registry(format!(
                "Registry returned status {} for '{name}'",
                response.status()
            )));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn fetch_tarball(&self, url: &str) -> Result<ByteStream, PkgError> {
        let response = self
            .http
            .get(url)
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| PkgError::download_failed(format!("Failed to download '{url}': {e}")))?;

        if !response.status().is_success() {
            return Err(PkgError::download_failed(format!(
                "Download failed with status {} for '{url}'",
                response.status()
            )));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_TARBALL_SIZE {
                return Err(PkgError::download_failed(format!(
                    "Tarball too large: {len} bytes (max: {MAX_TARBALL_SIZE})"
                )));
            }
        }

        let url = url.to_string();
        Ok(response
            .bytes_stream()
            .map(move |chunk| {
                chunk.map_err(|e| {
                    PkgError::download_failed(format!("Failed to read body of '{url}': {e}"))
                })
            })
            .boxed())
    }
}
