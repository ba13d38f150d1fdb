//! File-based user settings.
//!
//! Settings are read from YAML in up to three tiers with field-by-field
//! merging:
//! 1. **Project** - `$CWD/propgraph/settings.yaml`
//! 2. **User** - `~/.propgraph/settings.yaml`
//! 3. **Environment** - variables listed below
//!
//! ## Environment Variables
//! - `PROPGRAPH_PACKAGES` - Comma separated packages, replacing file values
//! - `PROPGRAPH_LOCALIZE_COMMANDS` - `true`/`false`
//! - `PROPGRAPH_PROJECT_DIR` - Project settings dir (default: `./propgraph`)
//! - `PROPGRAPH_USER_DIR` - User settings dir (default: `~/.propgraph`)
//!
//! [`Settings::apply`] feeds the result into a [`Builder`] as ordinary user
//! configuration; resolution itself never touches the filesystem.

mod loader;
mod merge;

pub use loader::{SETTINGS_FILE, SettingsLoader, SettingsPaths, SettingsTier};
pub use merge::{deep_merge, merge_into};

use crate::builder::Builder;
use crate::extension::ExtensionFilter;
use crate::services::{ExpirationStrategy, ReplyConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// User-settable values. Unset fields leave the built-in defaults alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub packages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub localize_commands: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown_on_failure: Option<bool>,
    /// Minutes of inactivity before components expire; `0` disables expiry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_minutes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionFilter>,
}

impl Settings {
    /// Register every set value on `builder` at user priority.
    pub fn apply(&self, builder: &mut Builder) {
        if !self.packages.is_empty() {
            builder.packages(self.packages.iter().cloned());
        }
        if let Some(localize) = self.localize_commands {
            builder.localize_commands(localize);
        }
        if let Some(shutdown) = self.shutdown_on_failure {
            builder.shutdown_on_failure(shutdown);
        }
        if let Some(minutes) = self.expiration_minutes {
            builder.expiration_strategy(match minutes {
                0 => ExpirationStrategy::Never,
                minutes => ExpirationStrategy::AfterInactivity { minutes },
            });
        }
        if let Some(reply) = &self.reply {
            builder.global_reply_config(reply.clone());
        }
        if let Some(filter) = &self.extensions {
            builder.set_extension_filter(filter.clone());
        }
    }

    /// Apply `PROPGRAPH_*` overrides, reading variables through `var`.
    pub(crate) fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(packages) = var("PROPGRAPH_PACKAGES") {
            self.packages = packages
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(raw) = var("PROPGRAPH_LOCALIZE_COMMANDS") {
            match parse_bool(&raw) {
                Some(value) => self.localize_commands = Some(value),
                None => warn!(value = %raw, "Ignoring PROPGRAPH_LOCALIZE_COMMANDS: not a boolean"),
            }
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
