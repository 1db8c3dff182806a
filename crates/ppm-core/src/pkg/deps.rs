//! Installed package manifest reading.
//!
//! After a package is extracted, its own `package.json` tells the installer
//! what to fetch next.

use super::error::{codes, PkgError};
use serde_json::Value;
use std::io;
use std::path::Path;

/// Manifest filename inside an installed package.
pub const MANIFEST_NAME: &str = "package.json";

/// Dependencies declared by a package manifest.
#[derive(Debug, Clone, Default)]
pub struct PackageDeps {
    /// Valid dependencies as (name, range) pairs, sorted by name.
    pub deps: Vec<(String, String)>,
    /// Errors encountered during extraction.
    pub errors: Vec<PkgDepError>,
}

/// Error encountered while extracting a dependency.
#[derive(Debug, Clone)]
pub struct PkgDepError {
    /// Package name (if known).
    pub name: String,
    /// Error code.
    pub code: &'static str,
    /// Error message.
    pub message: String,
}

impl PkgDepError {
    /// Create a new dependency error.
    #[must_use]
    pub fn new(name: impl Into<String>, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code,
            message: message.into(),
        }
    }
}

/// Read the `dependencies` section of a package manifest.
///
/// A missing manifest yields no dependencies. `devDependencies` and friends
/// are ignored: only runtime dependencies are installed transitively.
///
/// # Errors
/// Returns `PKG_PACKAGE_JSON_INVALID` if the file cannot be read or is not a
/// JSON object.
pub fn read_package_deps(package_json_path: &Path) -> Result<PackageDeps, PkgError> {
    let content = match ppm_util::fs::read_to_string_lossy(package_json_path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(PackageDeps::default()),
        Err(e) => {
            return Err(PkgError::package_json_invalid(format!(
                "Failed to read {}: {e}",
                package_json_path.display()
            )))
        }
    };

    let pkg_json: Value = serde_json::from_str(&content).map_err(|e| {
        PkgError::package_json_invalid(format!(
            "Invalid JSON in {}: {e}",
            package_json_path.display()
        ))
    })?;

    let root = pkg_json.as_object().ok_or_else(|| {
        PkgError::package_json_invalid(format!(
            "{} must be a JSON object",
            package_json_path.display()
        ))
    })?;

    let mut result = PackageDeps::default();

    let Some(section) = root.get("dependencies") else {
        return Ok(result);
    };

    let Some(section) = section.as_object() else {
        result.errors.push(PkgDepError::new(
            "dependencies",
            codes::PKG_PACKAGE_JSON_INVALID,
            format!("'dependencies' must be an object, got {}", json_type_name(section)),
        ));
        return Ok(result);
    };

    for (name, range) in section {
        if let Some(range) = range.as_str() {
            result.deps.push((name.clone(), range.to_string()));
        } else {
            result.errors.push(PkgDepError::new(
                name,
                codes::PKG_PACKAGE_JSON_INVALID,
                format!("expected string range, got {}", json_type_name(range)),
            ));
        }
    }

    result.deps.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(result)
}

/// Get a human-readable type name for a JSON value.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_package_json(dir: &Path, content: &str) -> std::path::PathBuf {
        let path = dir.join(MANIFEST_NAME);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_dependencies_only() {
        let dir = tempdir().unwrap();
        let path = write_package_json(
            dir.path(),
            r#"{
                "name": "test",
                "dependencies": {
                    "b": "2.0.0",
                    "a": "^1.0.0"
                },
                "devDependencies": {
                    "c": "^3.0.0"
                }
            }"#,
        );

        let result = read_package_deps(&path).unwrap();

        assert_eq!(
            result.deps,
            vec![
                ("a".to_string(), "^1.0.0".to_string()),
                ("b".to_string(), "2.0.0".to_string()),
            ]
        );
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_missing_manifest_has_no_deps() {
        let dir = tempdir().unwrap();
        let result = read_package_deps(&dir.path().join(MANIFEST_NAME)).unwrap();
        assert!(result.deps.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_no_dependencies_section() {
        let dir = tempdir().unwrap();
        let path = write_package_json(dir.path(), r#"{"name": "leaf"}"#);
        assert!(read_package_deps(&path).unwrap().deps.is_empty());
    }

    #[test]
    fn test_invalid_json() {
        let dir = tempdir().unwrap();
        let path = write_package_json(dir.path(), "{ nope");
        let err = read_package_deps(&path).unwrap_err();
        assert_eq!(err.code(), codes::PKG_PACKAGE_JSON_INVALID);
    }

    #[test]
    fn test_non_object_root() {
        let dir = tempdir().unwrap();
        let path = write_package_json(dir.path(), "[]");
        assert!(read_package_deps(&path).is_err());
    }

    #[test]
    fn test_invalid_range_collected() {
        let dir = tempdir().unwrap();
        let path = write_package_json(
            dir.path(),
            r#"{ "dependencies": { "a": "^1", "b": 2, "c": null } }"#,
        );

        let result = read_package_deps(&path).unwrap();
        assert_eq!(result.deps, vec![("a".to_string(), "^1".to_string())]);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].name, "b");
        assert!(result.errors[0].message.contains("number"));
        assert!(result.errors[1].message.contains("null"));
    }

    #[test]
    fn test_invalid_section() {
        let dir = tempdir().unwrap();
        let path = write_package_json(dir.path(), r#"{ "dependencies": ["a"] }"#);

        let result = read_package_deps(&path).unwrap();
        assert!(result.deps.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("array"));
    }
}
