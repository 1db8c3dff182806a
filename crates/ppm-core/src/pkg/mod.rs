//! Package manager functionality.
//!
//! Provides utilities for:
//! - Parsing package specifications (name@range)
//! - Fetching package metadata and tarballs from the registry
//! - Resolving version ranges against published versions
//! - Caching downloaded archives
//! - Extracting tarballs into `node_modules`
//! - Reading dependencies from installed manifests
//! - Maintaining the `prisma.lock` lock file
//! - Walking and installing dependency trees
//! - Uninstalling and pruning packages

pub mod cache;
pub mod deps;
pub mod error;
pub mod install;
pub mod lockfile;
pub mod prune;
pub mod registry;
pub mod spec;
pub mod tarball;
pub mod version;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{CachedArchive, PackageCache};
pub use deps::{read_package_deps, PackageDeps, PkgDepError};
pub use error::{codes as pkg_codes, ErrorKind, PkgError};
pub use install::{
    InstallFailure, InstallReport, InstallSummary, InstalledPackage, Installer, LockedPackage,
};
pub use lockfile::{Lockfile, LOCKFILE_NAME};
pub use prune::{list_installed, prune_modules, uninstall, ListedPackage, UninstallReport};
pub use registry::{Registry, RegistryClient, RegistryMetadata, DEFAULT_REGISTRY, REGISTRY_ENV};
pub use spec::PackageSpec;
pub use tarball::{extract_tgz, MAX_TARBALL_SIZE};
pub use version::{resolve_version, version_satisfies};
