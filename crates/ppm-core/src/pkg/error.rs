//! Package manager error types.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use std::io;

/// Package manager error codes.
pub mod codes {
    pub const PKG_SPEC_INVALID: &str = "PKG_SPEC_INVALID";
    pub const PKG_NOT_FOUND: &str = "PKG_NOT_FOUND";
    pub const PKG_VERSION_NOT_FOUND: &str = "PKG_VERSION_NOT_FOUND";
    pub const PKG_REGISTRY_ERROR: &str = "PKG_REGISTRY_ERROR";
    pub const PKG_DOWNLOAD_FAILED: &str = "PKG_DOWNLOAD_FAILED";
    pub const PKG_EXTRACT_FAILED: &str = "PKG_EXTRACT_FAILED";
    pub const NODE_MODULES_WRITE_FAILED: &str = "NODE_MODULES_WRITE_FAILED";
    pub const PKG_CACHE_ERROR: &str = "PKG_CACHE_ERROR";
    pub const PKG_PACKAGE_JSON_INVALID: &str = "PKG_PACKAGE_JSON_INVALID";
    pub const PKG_LOCK_INVALID_JSON: &str = "PKG_LOCK_INVALID_JSON";
    pub const PKG_LOCK_WRITE_FAILED: &str = "PKG_LOCK_WRITE_FAILED";
}

/// Broad failure category, used by callers to pick a reporting policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Package or version absent from the registry.
    NotFound,
    /// Transport failure or bad registry response.
    Network,
    /// File system failure writing cache, lock or module files.
    Io,
    /// Malformed specifier, manifest or lock file.
    Config,
}

/// Package manager error.
///
/// Serializes as `{code, kind, message}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgError {
    code: &'static str,
    message: String,
}

impl PkgError {
    /// Create a new error with the given code and message.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self.code {
            codes::PKG_NOT_FOUND | codes::PKG_VERSION_NOT_FOUND => ErrorKind::NotFound,
            codes::PKG_REGISTRY_ERROR | codes::PKG_DOWNLOAD_FAILED => ErrorKind::Network,
            codes::PKG_SPEC_INVALID
            | codes::PKG_PACKAGE_JSON_INVALID
            | codes::PKG_LOCK_INVALID_JSON => ErrorKind::Config,
            _ => ErrorKind::Io,
        }
    }

    /// Create a spec invalid error.
    pub fn spec_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_SPEC_INVALID, msg)
    }

    /// Create a package not found error.
    #[must_use]
    pub fn not_found(name: &str) -> Self {
        Self::new(codes::PKG_NOT_FOUND, format!("Package not found: {name}"))
    }

    /// Create a version not found error.
    ///
    /// `available` is listed in the message as given; callers pass at most a
    /// handful of the highest versions.
    #[must_use]
    pub fn version_not_found(name: &str, range: &str, available: &[&str]) -> Self {
        let message = if available.is_empty() {
            format!("No version of {name} satisfies range: {range} (no versions published)")
        } else {
            format!(
                "No version of {name} satisfies range: {range} (available: {})",
                available.join(", ")
            )
        };
        Self::new(codes::PKG_VERSION_NOT_FOUND, message)
    }

    /// Create a registry error.
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_REGISTRY_ERROR, msg)
    }

    /// Create a download failed error.
    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_DOWNLOAD_FAILED, msg)
    }

    /// Create an extraction failed error.
    pub fn extract_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_EXTRACT_FAILED, msg)
    }

    /// Create a `node_modules` write failed error.
    pub fn node_modules_write_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::NODE_MODULES_WRITE_FAILED, msg)
    }

    /// Create a cache error.
    pub fn cache_error(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_CACHE_ERROR, msg)
    }

    /// Create a package.json invalid error.
    pub fn package_json_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_PACKAGE_JSON_INVALID, msg)
    }

    /// Create a lock file invalid error.
    pub fn lock_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_LOCK_INVALID_JSON, msg)
    }

    /// Create a lock file write error.
    pub fn lock_write_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_LOCK_WRITE_FAILED, msg)
    }
}

impl fmt::Display for PkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PkgError {}

impl Serialize for PkgError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PkgError", 3)?;
        state.serialize_field("code", self.code)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.message)?;
        state.end()
    }
}

impl From<io::Error> for PkgError {
    fn from(e: io::Error) -> Self {
        Self::new(codes::PKG_CACHE_ERROR, e.to_string())
    }
}

impl From<reqwest::Error> for PkgError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::new(codes::PKG_REGISTRY_ERROR, format!("Request timed out: {e}"))
        } else if e.is_connect() {
            Self::new(codes::PKG_REGISTRY_ERROR, format!("Connection failed: {e}"))
        } else {
            Self::new(codes::PKG_REGISTRY_ERROR, e.to_string())
        }
    }
}

impl From<serde_json::Error> for PkgError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(codes::PKG_REGISTRY_ERROR, format!("Invalid JSON: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        let err = PkgError::spec_invalid("bad spec");
        assert_eq!(err.code(), codes::PKG_SPEC_INVALID);
        assert!(err.to_string().contains(codes::PKG_SPEC_INVALID));
    }

    #[test]
    fn test_error_codes_uppercase() {
        let all_codes = [
            codes::PKG_SPEC_INVALID,
            codes::PKG_NOT_FOUND,
            codes::PKG_VERSION_NOT_FOUND,
            codes::PKG_REGISTRY_ERROR,
            codes::PKG_DOWNLOAD_FAILED,
            codes::PKG_EXTRACT_FAILED,
            codes::NODE_MODULES_WRITE_FAILED,
            codes::PKG_CACHE_ERROR,
            codes::PKG_PACKAGE_JSON_INVALID,
            codes::PKG_LOCK_INVALID_JSON,
            codes::PKG_LOCK_WRITE_FAILED,
        ];

        for code in all_codes {
            assert!(
                code.chars().all(|c| c.is_uppercase() || c == '_'),
                "Error code '{code}' should be SCREAMING_SNAKE_CASE"
            );
        }
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(PkgError::not_found("a").kind(), ErrorKind::NotFound);
        assert_eq!(
            PkgError::version_not_found("a", "^9", &[]).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(PkgError::registry("down").kind(), ErrorKind::Network);
        assert_eq!(PkgError::download_failed("reset").kind(), ErrorKind::Network);
        assert_eq!(PkgError::extract_failed("bad gzip").kind(), ErrorKind::Io);
        assert_eq!(PkgError::lock_write_failed("denied").kind(), ErrorKind::Io);
        assert_eq!(PkgError::lock_invalid("{").kind(), ErrorKind::Config);
        assert_eq!(PkgError::spec_invalid("@").kind(), ErrorKind::Config);
    }

    #[test]
    fn test_version_not_found_lists_available() {
        let err = PkgError::version_not_found("a", "^3", &["2.0.0", "1.0.0"]);
        assert!(err.message().contains("^3"));
        assert!(err.message().contains("available: 2.0.0, 1.0.0"));
    }

    #[test]
    fn test_serializes_code_kind_and_message() {
        let json = serde_json::to_value(PkgError::not_found("left-pad")).unwrap();
        assert_eq!(json["code"], "PKG_NOT_FOUND");
        assert_eq!(json["kind"], "not_found");
        assert_eq!(json["message"], "Package not found: left-pad");

        let json = serde_json::to_value(PkgError::download_failed("reset")).unwrap();
        assert_eq!(json["kind"], "network");
    }
}
