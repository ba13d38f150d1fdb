//! Tracing setup for the inspector binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the embedding application.

use anyhow::Result;
use std::fs::OpenOptions;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Off,
    Stdout,
    Stderr,
    /// Appended to this file, without ANSI colors.
    File(String),
}

impl FromStr for LogTarget {
    type Err = std::convert::Infallible;

    /// `0`/`off`, `1`/`stdout`, `2`/`stderr`, anything else is a file name.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "0" | "off" => LogTarget::Off,
            "1" | "stdout" => LogTarget::Stdout,
            "2" | "stderr" => LogTarget::Stderr,
            filename => LogTarget::File(filename.to_string()),
        })
    }
}

/// Filter honoring `RUST_LOG`, otherwise `debug` when verbose and `info` else.
pub fn filter(verbose: bool) -> EnvFilter {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(target: &LogTarget, verbose: bool) -> Result<()> {
    let builder = FmtSubscriber::builder().with_env_filter(filter(verbose));
    match target {
        LogTarget::Off => {}
        LogTarget::Stdout => {
            tracing::subscriber::set_global_default(builder.with_writer(std::io::stdout).finish())?;
        }
        LogTarget::Stderr => {
            tracing::subscriber::set_global_default(builder.with_writer(std::io::stderr).finish())?;
        }
        LogTarget::File(filename) => {
            let file = OpenOptions::new().create(true).append(true).open(filename)?;
            let subscriber = builder.with_writer(Mutex::new(file)).with_ansi(false).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}
