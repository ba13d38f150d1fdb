//! propgraph inspector
//!
//! Loads settings from the usual tiers, builds the configuration and prints
//! the result as JSON.

use anyhow::Result;
use clap::Parser;
use propgraph::cli::{Cli, Command, ShowArgs, run};
use propgraph::logging;
use propgraph::settings::SettingsLoader;
use tracing::{debug, info};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log, cli.verbose)?;

    let loader = match &cli.settings {
        Some(path) => SettingsLoader::load_file(path)?,
        None => SettingsLoader::load()?,
    };
    for (tier, path) in loader.sources() {
        info!(tier = %tier, path = %path.display(), "Using settings");
    }
    debug!(settings = ?loader.settings(), "Effective settings");

    let command = cli
        .command
        .unwrap_or_else(|| Command::Show(ShowArgs::default()));
    let output = run(&command, loader.settings())?;
    println!("{output}");
    Ok(())
}
