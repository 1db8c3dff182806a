//! `ppm cache ls` and `ppm cache clean`.

use super::{print_json, Project};
use miette::{IntoDiagnostic, Result};
use ppm_core::pkg::{CachedArchive, PackageCache};
use ppm_core::Config;
use serde::Serialize;
use std::path::PathBuf;

/// Cache list result for JSON output.
#[derive(Serialize)]
struct CacheListOutput {
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    root: Option<PathBuf>,
    archives: Vec<CachedArchive>,
    total_bytes: u64,
}

/// Cache clean result for JSON output.
#[derive(Serialize)]
struct CacheCleanOutput {
    enabled: bool,
    removed: usize,
}

fn open_cache(config: &Config) -> Result<Option<PackageCache>> {
    let project = Project::open(config)?;
    Ok(project.paths.cache_dir.map(PackageCache::new))
}

fn print_disabled() {
    println!("Cache disabled (set customSettings.cacheDirectory in ppm.json to enable)");
}

pub fn list(config: &Config, json: bool) -> Result<()> {
    let Some(cache) = open_cache(config)? else {
        if json {
            return print_json(&CacheListOutput {
                enabled: false,
                root: None,
                archives: Vec::new(),
                total_bytes: 0,
            });
        }
        print_disabled();
        return Ok(());
    };

    let archives = cache.list().into_diagnostic()?;
    let total_bytes = archives.iter().map(|a| a.size_bytes).sum::<u64>();

    if json {
        return print_json(&CacheListOutput {
            enabled: true,
            root: Some(cache.root().to_path_buf()),
            archives,
            total_bytes,
        });
    }

    if archives.is_empty() {
        println!("Cache is empty ({})", cache.root().display());
        return Ok(());
    }

    for archive in &archives {
        let size_kb = archive.size_bytes / 1024;
        println!("{} ({size_kb} KB)", archive.file_name);
    }
    let total_mb = total_bytes as f64 / (1024.0 * 1024.0);
    println!("\nTotal: {total_mb:.2} MB");

    Ok(())
}

pub fn clean(config: &Config, json: bool) -> Result<()> {
    let Some(cache) = open_cache(config)? else {
        if json {
            return print_json(&CacheCleanOutput {
                enabled: false,
                removed: 0,
            });
        }
        print_disabled();
        return Ok(());
    };

    let removed = cache.clean().into_diagnostic()?;

    if json {
        return print_json(&CacheCleanOutput {
            enabled: true,
            removed,
        });
    }

    println!("Removed {removed} cached archive(s)");
    Ok(())
}
