//! Package spec parsing.
//!
//! Parses package specifications like:
//! - `left-pad`
//! - `left-pad@1.3.0`
//! - `left-pad@^1`
//! - `@types/node`
//! - `@types/node@~20.1`

use super::error::PkgError;
use std::fmt;

/// Range keyword meaning "whatever the registry tags as latest".
pub const LATEST_TAG: &str = "latest";

/// A parsed package specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Full package name (e.g., "@scope/name" or "name").
    pub name: String,
    /// Scope without the @ prefix, if scoped.
    pub scope: Option<String>,
    /// Version range or tag (None means latest).
    pub range: Option<String>,
}

impl PackageSpec {
    /// Parse a package specification string.
    ///
    /// # Errors
    /// Returns an error if the spec is invalid.
    pub fn parse(input: &str) -> Result<Self, PkgError> {
        let input = input.trim();

        if input.is_empty() {
            return Err(PkgError::spec_invalid("Empty package spec"));
        }

        // A leading '@' belongs to the scope, not the range separator
        if input.starts_with('@') {
            Self::parse_scoped(input)
        } else {
            Self::parse_unscoped(input)
        }
    }

    /// Spec for a bare name with no range.
    ///
    /// # Errors
    /// Returns an error if `name` is not a valid package name or carries a range.
    pub fn latest(name: &str) -> Result<Self, PkgError> {
        let spec = Self::parse(name)?;
        if spec.range.is_some() {
            return Err(PkgError::spec_invalid(format!(
                "Expected a package name without a version: '{name}'"
            )));
        }
        Ok(spec)
    }

    fn parse_scoped(input: &str) -> Result<Self, PkgError> {
        let Some(slash_pos) = input.find('/') else {
            return Err(PkgError::spec_invalid(format!(
                "Invalid scoped package: missing '/' in '{input}'"
            )));
        };

        if slash_pos == 1 {
            return Err(PkgError::spec_invalid(format!(
                "Invalid scoped package: empty scope in '{input}'"
            )));
        }

        let scope = &input[1..slash_pos];
        let after_slash = &input[slash_pos + 1..];

        let (pkg_name, range) = match after_slash.split_once('@') {
            Some((pkg_name, range)) => (pkg_name, Some(range)),
            None => (after_slash, None),
        };

        if pkg_name.is_empty() {
            return Err(PkgError::spec_invalid(format!(
                "Invalid scoped package: empty name in '{input}'"
            )));
        }

        Self::validate_name(scope)?;
        Self::validate_name(pkg_name)?;
        let range = Self::validate_range(input, range)?;

        Ok(Self {
            name: format!("@{scope}/{pkg_name}"),
            scope: Some(scope.to_string()),
            range,
        })
    }

    fn parse_unscoped(input: &str) -> Result<Self, PkgError> {
        let (name, range) = match input.split_once('@') {
            Some((name, range)) => (name, Some(range)),
            None => (input, None),
        };

        if name.is_empty() {
            return Err(PkgError::spec_invalid(format!(
                "Invalid package spec: empty name in '{input}'"
            )));
        }

        Self::validate_name(name)?;
        let range = Self::validate_range(input, range)?;

        Ok(Self {
            name: name.to_string(),
            scope: None,
            range,
        })
    }

    fn validate_range(input: &str, range: Option<&str>) -> Result<Option<String>, PkgError> {
        let Some(range) = range else {
            return Ok(None);
        };

        if range.is_empty() {
            return Err(PkgError::spec_invalid(format!(
                "Invalid package spec: empty version range in '{input}'"
            )));
        }

        if range.contains('@') {
            return Err(PkgError::spec_invalid(format!(
                "Invalid package spec: more than one '@' in '{input}'"
            )));
        }

        Ok(Some(range.to_string()))
    }

    fn validate_name(name: &str) -> Result<(), PkgError> {
        if name.is_empty() {
            return Err(PkgError::spec_invalid("Empty package name"));
        }

        // Also keeps `.` and `..` from escaping node_modules
        if name.starts_with('.') {
            return Err(PkgError::spec_invalid(format!(
                "Package name cannot start with '.': '{name}'"
            )));
        }

        // Basic validation: no spaces, no special chars except - and _
        for c in name.chars() {
            if !c.is_alphanumeric() && c != '-' && c != '_' && c != '.' {
                return Err(PkgError::spec_invalid(format!(
                    "Invalid character '{c}' in package name '{name}'"
                )));
            }
        }

        Ok(())
    }

    /// Check a bare package name, such as one read from a manifest.
    ///
    /// Accepts exactly the names [`PackageSpec::parse`] produces, so the name
    /// maps to a single directory (or scope and directory) under
    /// `node_modules`.
    ///
    /// # Errors
    /// Returns `PKG_SPEC_INVALID` if `name` is not a valid package name.
    pub fn validate_package_name(name: &str) -> Result<(), PkgError> {
        let spec = Self::latest(name)?;
        if spec.name != name {
            return Err(PkgError::spec_invalid(format!(
                "Invalid package name: '{name}'"
            )));
        }
        Ok(())
    }

    /// The range to resolve, with `latest` folded into `None`.
    #[must_use]
    pub fn effective_range(&self) -> Option<&str> {
        match self.range.as_deref() {
            None | Some(LATEST_TAG) => None,
            Some(range) => Some(range),
        }
    }
}

/// URL-encode a package name for registry requests.
///
/// For scoped packages, encodes the `/` as `%2F`.
#[must_use]
pub fn url_encoded_name(name: &str) -> String {
    if name.starts_with('@') {
        name.replace('/', "%2F")
    } else {
        name.to_string()
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}@{range}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let spec = PackageSpec::parse("left-pad").unwrap();
        assert_eq!(spec.name, "left-pad");
        assert_eq!(spec.scope, None);
        assert_eq!(spec.range, None);
    }

    #[test]
    fn test_parse_with_version() {
        let spec = PackageSpec::parse("left-pad@1.3.0").unwrap();
        assert_eq!(spec.name, "left-pad");
        assert_eq!(spec.range, Some("1.3.0".to_string()));
    }

    #[test]
    fn test_parse_with_caret_and_tilde() {
        let spec = PackageSpec::parse("react@^18").unwrap();
        assert_eq!(spec.range.as_deref(), Some("^18"));

        let spec = PackageSpec::parse("react@~18.2").unwrap();
        assert_eq!(spec.range.as_deref(), Some("~18.2"));
    }

    #[test]
    fn test_parse_scoped() {
        let spec = PackageSpec::parse("@types/node").unwrap();
        assert_eq!(spec.name, "@types/node");
        assert_eq!(spec.scope, Some("types".to_string()));
        assert_eq!(spec.range, None);
    }

    #[test]
    fn test_parse_scoped_with_version() {
        let spec = PackageSpec::parse("@scope/pkg@1.0.0").unwrap();
        assert_eq!(spec.name, "@scope/pkg");
        assert_eq!(spec.scope, Some("scope".to_string()));
        assert_eq!(spec.range, Some("1.0.0".to_string()));
    }

    #[test]
    fn test_display_round_trip() {
        for input in [
            "left-pad",
            "left-pad@1.3.0",
            "left-pad@^1",
            "left-pad@latest",
            "@types/node",
            "@scope/pkg@1.0.0",
            "@scope/pkg@~2.1",
        ] {
            let spec = PackageSpec::parse(input).unwrap();
            assert_eq!(spec.to_string(), input);
            assert_eq!(PackageSpec::parse(&spec.to_string()).unwrap(), spec);
        }
    }

    #[test]
    fn test_effective_range_folds_latest() {
        assert_eq!(PackageSpec::parse("a").unwrap().effective_range(), None);
        assert_eq!(PackageSpec::parse("a@latest").unwrap().effective_range(), None);
        assert_eq!(PackageSpec::parse("a@^1").unwrap().effective_range(), Some("^1"));
    }

    #[test]
    fn test_latest_rejects_range() {
        assert_eq!(PackageSpec::latest("@scope/pkg").unwrap().name, "@scope/pkg");
        assert!(PackageSpec::latest("a@1.0.0").is_err());
    }

    #[test]
    fn test_parse_empty_fails() {
        assert!(PackageSpec::parse("").is_err());
        assert!(PackageSpec::parse("   ").is_err());
    }

    #[test]
    fn test_parse_at_only_fails() {
        assert!(PackageSpec::parse("@").is_err());
        assert!(PackageSpec::parse("@1.0.0").is_err());
    }

    #[test]
    fn test_parse_scope_only_fails() {
        assert!(PackageSpec::parse("@scope").is_err());
        assert!(PackageSpec::parse("@scope/").is_err());
        assert!(PackageSpec::parse("@/pkg").is_err());
    }

    #[test]
    fn test_parse_empty_range_fails() {
        assert!(PackageSpec::parse("left-pad@").is_err());
        assert!(PackageSpec::parse("@types/node@").is_err());
    }

    #[test]
    fn test_parse_second_separator_fails() {
        assert!(PackageSpec::parse("a@1.0.0@2.0.0").is_err());
        assert!(PackageSpec::parse("@scope/pkg@1@2").is_err());
    }

    #[test]
    fn test_parse_leading_dot_fails() {
        assert!(PackageSpec::parse("..").is_err());
        assert!(PackageSpec::parse(".hidden@1.0.0").is_err());
        assert!(PackageSpec::parse("@scope/..").is_err());
    }

    #[test]
    fn test_validate_package_name() {
        assert!(PackageSpec::validate_package_name("left-pad").is_ok());
        assert!(PackageSpec::validate_package_name("@types/node").is_ok());

        for name in [
            "",
            "../../escaped",
            "..",
            "a/b",
            "@scope/a/b",
            "@scope/../x",
            "a\\b",
            " padded",
            "pkg@1.0.0",
            "@scope",
        ] {
            let err = PackageSpec::validate_package_name(name).unwrap_err();
            assert_eq!(err.code(), crate::pkg::error::codes::PKG_SPEC_INVALID, "{name}");
        }
    }

    #[test]
    fn test_url_encoded_name() {
        assert_eq!(url_encoded_name("left-pad"), "left-pad");
        assert_eq!(url_encoded_name("@types/node"), "@types%2Fnode");
    }
}
