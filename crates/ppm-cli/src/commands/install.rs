//! `ppm install`, `ppm update` and `ppm upgrade`.

use super::{print_json, runtime, Project};
use miette::{IntoDiagnostic, Result};
use ppm_core::config::PROJECT_CONFIG_NAME;
use ppm_core::pkg::{
    ErrorKind, InstallFailure, InstallReport, InstallSummary, InstalledPackage, Installer,
    LockedPackage, REGISTRY_ENV,
};
use ppm_core::Config;
use serde::Serialize;
use tracing::info;

/// Install result for JSON output.
#[derive(Serialize)]
struct InstallOutput<'a> {
    ok: bool,
    summary: InstallSummary,
    installed: &'a [InstalledPackage],
    locked: &'a [LockedPackage],
    failures: &'a [InstallFailure],
}

pub fn run(config: &Config, specs: &[String], json: bool) -> Result<()> {
    let project = Project::open(config)?;

    let specs = if specs.is_empty() {
        let Some(project_config) = &project.config else {
            miette::bail!(
                "No {PROJECT_CONFIG_NAME} found in {}; pass package names or create one",
                project.paths.root.display()
            );
        };
        project_config.dependency_specs()
    } else {
        specs.to_vec()
    };

    if specs.is_empty() {
        if json {
            return finish(&InstallReport::default(), json);
        }
        println!("No dependencies to install");
        return Ok(());
    }

    info!(specs = ?specs, "INSTALL command invoked");

    let registry = project.registry()?;
    let installer = Installer::new(&registry, &project.paths);
    let report = runtime()?
        .block_on(installer.install_all(specs.as_slice()))
        .into_diagnostic()?;

    finish(&report, json)
}

pub fn update(config: &Config, name: &str, json: bool) -> Result<()> {
    let project = Project::open(config)?;
    let registry = project.registry()?;
    let installer = Installer::new(&registry, &project.paths);

    let report = runtime()?
        .block_on(installer.update(name))
        .into_diagnostic()?;

    finish(&report, json)
}

pub fn upgrade(config: &Config, json: bool) -> Result<()> {
    let project = Project::open(config)?;
    let registry = project.registry()?;
    let installer = Installer::new(&registry, &project.paths);

    let report = runtime()?
        .block_on(installer.upgrade())
        .into_diagnostic()?;

    if !json && report == InstallReport::default() {
        println!("No packages to upgrade");
        return Ok(());
    }

    finish(&report, json)
}

/// Print the report and exit 1 if a requested package failed.
fn finish(report: &InstallReport, json: bool) -> Result<()> {
    if json {
        print_json(&InstallOutput {
            ok: !report.root_failed(),
            summary: report.summary(),
            installed: &report.installed,
            locked: &report.locked,
            failures: &report.failures,
        })?;
    } else {
        print_report(report);
    }

    if report.root_failed() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &InstallReport) {
    for pkg in &report.installed {
        let indent = "  ".repeat(pkg.depth);
        let source = if pkg.from_cache { " (cached)" } else { "" };
        println!("{indent}+ {}@{}{source}", pkg.name, pkg.version);
    }

    for pkg in report.locked.iter().filter(|p| p.depth == 0) {
        println!("= {}@{} (already installed)", pkg.name, pkg.version);
    }

    for failure in &report.failures {
        let label = if failure.depth == 0 {
            "error"
        } else {
            "warning"
        };
        let requested = failure
            .range
            .as_deref()
            .map_or_else(|| failure.name.clone(), |r| format!("{}@{r}", failure.name));
        eprintln!(
            "{label}: {requested}: {} {}",
            failure.error.code(),
            failure.error.message()
        );
    }

    if report
        .failures
        .iter()
        .any(|f| f.error.kind() == ErrorKind::Network)
    {
        eprintln!(
            "hint: check the registry URL ({REGISTRY_ENV} or customSettings.registry in {PROJECT_CONFIG_NAME})"
        );
    }

    let skipped = report.transitive_failures().count();
    if skipped > 0 {
        eprintln!(
            "{skipped} dependenc{} could not be installed",
            if skipped == 1 { "y" } else { "ies" }
        );
    }

    let summary = report.summary();
    if summary.installed > 0 {
        println!(
            "Installed {} package{} ({} from cache)",
            summary.installed,
            if summary.installed == 1 { "" } else { "s" },
            summary.cached
        );
    }
}
