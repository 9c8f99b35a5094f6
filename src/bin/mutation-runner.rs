//! Mutation Runner CLI Binary
//!
//! Checks operation documents before they are handed to runners.

use anyhow::Context;
use clap::Parser;
use mutation_runner::cli::{execute, Cli};
use mutation_runner::config::SettingsLoader;
use mutation_runner::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let logging_config = match build_logging_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("mutation-runner starting");

    match execute(&cli.command) {
        Ok((output, passed)) => {
            println!("{}", output);
            if !passed {
                process::exit(2);
            }
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

/// Precedence: CLI flags override the config file, which overrides defaults.
fn build_logging_config(cli: &Cli) -> anyhow::Result<LoggingConfig> {
    let settings = match cli.config {
        Some(ref path) => SettingsLoader::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SettingsLoader::load().context("Failed to load settings")?,
    };

    let mut config = settings.logging;
    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    Ok(config)
}
