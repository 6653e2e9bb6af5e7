//! grove CLI Binary
//!
//! Command-line interface for tagging, categorizing, and querying directories.

use anyhow::Context;
use clap::Parser;
use grove::cli::{Cli, RunContext};
use grove::config::{ConfigLoader, GroveConfig};
use grove::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        error!("Command failed: {:#}", e);
        match e.downcast_ref::<grove::ApiError>() {
            Some(api) => eprintln!("{}", grove::cli::map_error(api)),
            None => eprintln!("{:#}", e),
        }
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli)?;
    apply_log_flags(cli, &mut config.logging);
    init_logging(Some(&config.logging)).context("Failed to initialize logging")?;

    info!(workspace = %cli.workspace.display(), "grove starting");

    let context = RunContext::with_config(cli.workspace.clone(), config)?;
    let output = context.execute(&cli.command)?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

/// An explicit `--config` file replaces the global and workspace layers.
fn load_config(cli: &Cli) -> Result<GroveConfig, grove::ApiError> {
    match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(&cli.workspace),
    }
}

/// Logging flags win over whatever the configuration layers settled on.
fn apply_log_flags(cli: &Cli, logging: &mut LoggingConfig) {
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    let overrides = [
        (&cli.log_level, &mut logging.level),
        (&cli.log_format, &mut logging.format),
        (&cli.log_output, &mut logging.output),
    ];
    for (flag, slot) in overrides {
        if let Some(value) = flag {
            *slot = value.clone();
        }
    }
    if let Some(file) = &cli.log_file {
        logging.file = file.clone();
    }
}
