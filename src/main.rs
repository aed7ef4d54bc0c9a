//! restyle - live stylesheet injection for running Electron applications.

mod cli;
mod config;
mod core;
mod embed;
mod inject;
mod logger;
mod process;
mod server;
mod service;
mod style;
mod utils;
mod watch;

use anyhow::{Context as _, Result};
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::{ConfigHandle, ConfigPaths};
use core::Context;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config_dir = cli.config_dir();
    match &cli.command {
        Commands::Run => service::run(Context::load(&config_dir)?),
        Commands::Inject { pid, exe } => service::inject_once(Context::load(&config_dir)?, *pid, exe),
        Commands::Check => cli::check_config(&ConfigPaths::new(config_dir)),
        Commands::Apps => {
            let paths = ConfigPaths::new(config_dir);
            let handle = ConfigHandle::load(paths).context("Failed to load configuration")?;
            cli::list_apps(&handle.snapshot(), handle.paths());
            Ok(())
        }
    }
}
