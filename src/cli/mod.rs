//! Command-line interface of the `propgraph` inspector.

use crate::builder::Builder;
use crate::extension::{ExtensionFilter, FilterStrategy};
use crate::logging::LogTarget;
use crate::properties::well_known;
use crate::resolved::ResolvedConfig;
use crate::settings::Settings;
use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

/// Inspect how configuration resolves.
#[derive(Parser, Debug)]
#[command(name = "propgraph")]
#[command(about = "Resolve and inspect layered configuration", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Settings file to use instead of the project and user tiers
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: LogTarget,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the configuration and print the resolved values (default)
    Show(ShowArgs),

    /// List the well-known properties
    Keys,

    /// Build the configuration and list contributors per property
    Providers(ShowArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct ShowArgs {
    /// Extra package to search for commands (repeatable)
    #[arg(short, long = "package")]
    pub packages: Vec<String>,

    /// Only load extensions whose id starts with this prefix (repeatable)
    #[arg(long = "include-extension", conflicts_with = "exclude")]
    pub include: Vec<String>,

    /// Skip extensions whose id starts with this prefix (repeatable)
    #[arg(long = "exclude-extension")]
    pub exclude: Vec<String>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl ShowArgs {
    /// Apply command-line overrides after file settings.
    pub fn apply(&self, builder: &mut Builder) {
        if !self.packages.is_empty() {
            builder.packages(self.packages.iter().cloned());
        }
        if !self.include.is_empty() {
            builder.set_extension_filter(ExtensionFilter::new(
                FilterStrategy::Include,
                self.include.iter().cloned(),
            ));
        } else if !self.exclude.is_empty() {
            builder.set_extension_filter(ExtensionFilter::new(
                FilterStrategy::Exclude,
                self.exclude.iter().cloned(),
            ));
        }
    }
}

#[derive(Debug, Serialize)]
struct Contribution {
    origin: String,
    priority: i32,
}

#[derive(Debug, Serialize)]
struct PropertyProviders {
    name: &'static str,
    providers: Vec<Contribution>,
}

/// Run `command` against `settings`, returning the JSON to print.
pub fn run(command: &Command, settings: &Settings) -> Result<String> {
    match command {
        Command::Keys => Ok(serde_json::to_string_pretty(&well_known())?),
        Command::Show(args) => {
            let config = build(settings, args)?;
            render(&config.summary()?, args.pretty)
        }
        Command::Providers(args) => {
            let config = build(settings, args)?;
            let listing: Vec<PropertyProviders> = well_known()
                .into_iter()
                .map(|info| PropertyProviders {
                    name: info.name,
                    providers: config
                        .loader()
                        .contributors(info.name)
                        .into_iter()
                        .map(|(origin, priority)| Contribution { origin, priority })
                        .collect(),
                })
                .collect();
            render(&listing, args.pretty)
        }
    }
}

fn build(settings: &Settings, args: &ShowArgs) -> Result<ResolvedConfig> {
    let mut builder = Builder::new();
    settings.apply(&mut builder);
    args.apply(&mut builder);
    match builder.build() {
        Ok(config) => Ok(config),
        Err(e) => bail!("[{:?}] {}", e.code(), e),
    }
}

fn render<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}
