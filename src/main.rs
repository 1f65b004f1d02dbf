//! fxvariants CLI
//!
//! Command-line front end for the variant batch processor.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fxvariants::cli::commands::{self, ProcessOverrides};
use fxvariants::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("fxvariants v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("fxvariants v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Process {
            inputs,
            output,
            variants,
            format,
            seed,
            workers,
            config,
            package,
            json,
        } => {
            let overrides = ProcessOverrides {
                variants,
                format,
                seed,
                workers,
            };
            let config = commands::resolve_config(config.as_deref(), &overrides)
                .context("invalid configuration")?;
            commands::process(&inputs, &output, config, package, json)
                .with_context(|| format!("batch failed for output {}", output.display()))
        }
        Commands::Package { dir } => commands::package_dir(&dir)
            .with_context(|| format!("failed to package {}", dir.display())),
        Commands::Finalize { dir } => commands::finalize(&dir)
            .with_context(|| format!("failed to finalize {}", dir.display())),
        Commands::Catalog => Ok(commands::show_catalog()?),
    }
}
