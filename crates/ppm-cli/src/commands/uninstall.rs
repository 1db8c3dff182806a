//! `ppm uninstall`.

use super::{print_json, Project};
use miette::{IntoDiagnostic, Result};
use ppm_core::pkg::uninstall;
use ppm_core::Config;

pub fn run(config: &Config, name: &str, json: bool) -> Result<()> {
    let project = Project::open(config)?;
    let report = uninstall(&project.paths, name).into_diagnostic()?;

    if json {
        return print_json(&report);
    }

    if report.removed {
        println!("- {}", report.name);
    } else {
        eprintln!("warning: {} is not installed", report.name);
    }
    for pruned in &report.pruned {
        println!("- {pruned} (pruned)");
    }

    Ok(())
}
