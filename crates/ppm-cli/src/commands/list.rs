//! `ppm list`.

use super::{print_json, Project};
use miette::{IntoDiagnostic, Result};
use ppm_core::pkg::list_installed;
use ppm_core::Config;

pub fn run(config: &Config, json: bool) -> Result<()> {
    let project = Project::open(config)?;
    let packages = list_installed(&project.paths).into_diagnostic()?;

    if json {
        return print_json(&packages);
    }

    if packages.is_empty() {
        println!("No packages installed");
        return Ok(());
    }

    for pkg in &packages {
        if pkg.installed {
            let size_kb = pkg.size_bytes / 1024;
            println!("{}@{} ({size_kb} KB)", pkg.name, pkg.version);
        } else {
            println!("{}@{} (missing from node_modules)", pkg.name, pkg.version);
        }
    }

    Ok(())
}
