use std::fmt::Write;

/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User agent sent with every registry request.
pub const USER_AGENT: &str = concat!("ppm/", env!("CARGO_PKG_VERSION"));

/// Returns a formatted version string including build metadata if available.
#[must_use]
pub fn version_string() -> String {
    let mut s = format!("ppm {VERSION}");

    if let Some(hash) = option_env!("PPM_BUILD_GIT_HASH") {
        let _ = write!(s, " ({hash})");
    }

    s
}
