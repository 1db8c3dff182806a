//! Version resolution.
//!
//! Range matching here is prefix based, not full semver:
//!
//! - `None` / `latest`: the `latest` dist-tag
//! - another dist-tag name (e.g. `next`): that tag
//! - `^N...`: highest version starting with `N.`
//! - `~N.M...`: highest version starting with `N.M.`
//! - `*` or empty: highest version
//! - anything else: exact string match
//!
//! "Highest" uses [`compare_versions`], which orders dot-separated
//! components numerically when both sides are numbers and lexically
//! otherwise. Pre-release tags therefore do not follow semver precedence
//! (`1.0.0-rc.1` sorts above `1.0.0`). Comparators such as `>=1.2` are not
//! understood and only match a version with that literal text.

use super::error::PkgError;
use super::registry::RegistryMetadata;
use super::spec::LATEST_TAG;
use std::cmp::Ordering;

/// Number of versions listed in a `PKG_VERSION_NOT_FOUND` message.
const MAX_LISTED_VERSIONS: usize = 5;

/// Resolve a version range against registry metadata.
///
/// # Errors
/// Returns `PKG_VERSION_NOT_FOUND` if no published version satisfies the range.
pub fn resolve_version(
    name: &str,
    range: Option<&str>,
    metadata: &RegistryMetadata,
) -> Result<String, PkgError> {
    let range = range.map(str::trim);

    let mut versions = metadata.version_keys();
    versions.sort_by(|a, b| compare_versions(b, a));

    let tag = match range {
        None | Some(LATEST_TAG) => Some(LATEST_TAG),
        Some(range) if metadata.dist_tags.contains_key(range) => Some(range),
        Some(_) => None,
    };

    let found = if let Some(tag) = tag {
        metadata
            .dist_tags
            .get(tag)
            .map(String::as_str)
            .filter(|v| metadata.versions.contains_key(*v))
    } else {
        let range = range.unwrap_or_default();
        versions
            .iter()
            .copied()
            .find(|v| version_satisfies(v, range))
    };

    found.map(String::from).ok_or_else(|| {
        let listed: Vec<&str> = versions.iter().copied().take(MAX_LISTED_VERSIONS).collect();
        PkgError::version_not_found(name, range.unwrap_or(LATEST_TAG), &listed)
    })
}

/// Check whether a version string satisfies a (non-tag) range.
#[must_use]
pub fn version_satisfies(version: &str, range: &str) -> bool {
    let range = range.trim();

    if range.is_empty() || range == "*" {
        return true;
    }

    if let Some(rest) = range.strip_prefix('^') {
        let major = rest.split('.').next().unwrap_or_default();
        return !major.is_empty() && version.starts_with(&format!("{major}."));
    }

    if let Some(rest) = range.strip_prefix('~') {
        let prefix: Vec<&str> = rest.split('.').take(2).collect();
        if prefix.iter().any(|p| p.is_empty()) {
            return false;
        }
        return version.starts_with(&format!("{}.", prefix.join(".")));
    }

    version == range
}

/// Numeric-aware version comparison.
///
/// Components are split on `.`; a pair of components that both parse as
/// integers compares numerically, anything else compares as strings. When
/// all shared components are equal, the version with more components is
/// greater.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        match (left.next(), right.next()) {
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (None, None) => return Ordering::Equal,
        }
    }
}

/// Whether a version string can be used as part of a file name.
///
/// Registry keys are untrusted; a resolved version must not carry a path
/// separator or a `..` segment.
#[must_use]
pub(crate) fn is_plain_version(version: &str) -> bool {
    !version.is_empty()
        && !version.starts_with('.')
        && !version.contains(['/', '\\'])
        && !version.contains("..")
}
