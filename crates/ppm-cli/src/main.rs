#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use ppm_core::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ppm")]
#[command(author, version, about = "A small package manager for registry-hosted tarballs", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Install packages and their dependencies
    ///
    /// With no arguments, installs every dependency listed in ppm.json.
    #[command(visible_alias = "i")]
    Install {
        /// Package specs (e.g., "left-pad", "left-pad@^1", "@types/node@~20.1")
        specs: Vec<String>,
    },

    /// Remove a package and prune modules no longer in the lock file
    #[command(visible_alias = "rm")]
    Uninstall {
        /// Package name
        name: String,
    },

    /// Reinstall a package at its latest version
    Update {
        /// Package name
        name: String,
    },

    /// Update every package in the lock file
    Upgrade,

    /// List locked packages
    #[command(visible_alias = "ls")]
    List,

    /// Manage the archive cache
    Cache {
        #[command(subcommand)]
        cache_cmd: CacheCommands,
    },
}

#[derive(clap::Subcommand, Debug)]
enum CacheCommands {
    /// List cached archives
    Ls,

    /// Remove every cached archive
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    let json = config.json_logs;
    match cli.command {
        Some(Commands::Version) | None => commands::version::run(json),
        Some(Commands::Install { specs }) => commands::install::run(&config, &specs, json),
        Some(Commands::Uninstall { name }) => commands::uninstall::run(&config, &name, json),
        Some(Commands::Update { name }) => commands::install::update(&config, &name, json),
        Some(Commands::Upgrade) => commands::install::upgrade(&config, json),
        Some(Commands::List) => commands::list::run(&config, json),
        Some(Commands::Cache { cache_cmd }) => match cache_cmd {
            CacheCommands::Ls => commands::cache::list(&config, json),
            CacheCommands::Clean => commands::cache::clean(&config, json),
        },
    }
}
