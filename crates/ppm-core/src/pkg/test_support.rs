//! In-memory registry for engine tests.

use super::error::PkgError;
use super::registry::{ByteStream, Dist, Registry, RegistryMetadata, VersionMetadata};
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::sync::Mutex;
use tar::Builder;

/// Registry double that serves published packages from memory and records
/// every request.
#[derive(Debug, Default)]
pub(crate) struct MockRegistry {
    packages: BTreeMap<String, RegistryMetadata>,
    tarballs: HashMap<String, Vec<u8>>,
    broken: HashSet<String>,
    metadata_requests: Mutex<Vec<String>>,
    tarball_requests: Mutex<Vec<String>>,
}

/// Build a registry-style tarball: every entry under `package/`.
pub(crate) fn build_tarball(files: &[(&str, String)]) -> Vec<u8> {
    let mut tar_bytes = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_bytes);
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(format!("package/{path}")).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, content.as_bytes()).unwrap();
        }
        builder.finish().unwrap();
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}

impl MockRegistry {
    /// Publish `name@version` with the given dependencies and tag it `latest`.
    pub(crate) fn publish(
        &mut self,
        name: &str,
        version: &str,
        deps: &[(&str, &str)],
    ) -> &mut Self {
        let dependencies: BTreeMap<String, String> = deps
            .iter()
            .map(|(n, r)| ((*n).to_string(), (*r).to_string()))
            .collect();

        let manifest = serde_json::json!({
            "name": name,
            "version": version,
            "dependencies": dependencies,
        });
        let tarball = build_tarball(&[
            ("package.json", manifest.to_string()),
            ("index.js", format!("module.exports = \"{name}@{version}\";\n")),
        ]);

        let url = self.tarball_url(name, version);
        self.tarballs.insert(url.clone(), tarball);

        let metadata = self.packages.entry(name.to_string()).or_default();
        metadata.name = Some(name.to_string());
        metadata
            .dist_tags
            .insert("latest".to_string(), version.to_string());
        metadata.versions.insert(
            version.to_string(),
            VersionMetadata {
                dist: Some(Dist { tarball: url }),
                dependencies,
            },
        );
        self
    }

    /// Point the `latest` tag somewhere else.
    pub(crate) fn set_latest(&mut self, name: &str, version: &str) -> &mut Self {
        if let Some(metadata) = self.packages.get_mut(name) {
            metadata
                .dist_tags
                .insert("latest".to_string(), version.to_string());
        }
        self
    }

    /// Make downloads of `name@version` fail halfway through the body.
    pub(crate) fn break_tarball(&mut self, name: &str, version: &str) -> &mut Self {
        let url = self.tarball_url(name, version);
        self.broken.insert(url);
        self
    }

    pub(crate) fn tarball_url(&self, name: &str, version: &str) -> String {
        format!("mock://registry/{name}/-/{version}.tgz")
    }

    pub(crate) fn tarball_bytes(&self, name: &str, version: &str) -> Vec<u8> {
        self.tarballs[&self.tarball_url(name, version)].clone()
    }

    /// Names whose metadata was requested, in order.
    pub(crate) fn metadata_requests(&self) -> Vec<String> {
        self.metadata_requests.lock().unwrap().clone()
    }

    /// Tarball URLs requested, in order.
    pub(crate) fn tarball_requests(&self) -> Vec<String> {
        self.tarball_requests.lock().unwrap().clone()
    }
}

impl Registry for MockRegistry {
    async fn fetch_metadata(&self, name: &str) -> Result<RegistryMetadata, PkgError> {
        self.metadata_requests
            .lock()
            .unwrap()
            .push(name.to_string());

        self.packages
            .get(name)
            .cloned()
            .ok_or_else(|| PkgError::not_found(name))
    }

    async fn fetch_tarball(&self, url: &str) -> Result<ByteStream, PkgError> {
        self.tarball_requests.lock().unwrap().push(url.to_string());

        let Some(bytes) = self.tarballs.get(url) else {
            return Err(PkgError::download_failed(format!(
                "Download failed with status 404 Not Found for '{url}'"
            )));
        };

        let bytes = Bytes::from(bytes.clone());
        if self.broken.contains(url) {
            let half = bytes.slice(..bytes.len() / 2);
            let chunks = vec![
                Ok(half),
                Err(PkgError::download_failed("connection reset by peer")),
            ];
            return Ok(stream::iter(chunks).boxed());
        }

        Ok(stream::iter(vec![Ok(bytes)]).boxed())
    }
}
