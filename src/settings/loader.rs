//! Tiered settings loading.
//!
//! Tiers, lowest to highest: defaults, project file, user file, environment.

use super::Settings;
use super::merge::deep_merge;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name looked up in each settings directory.
pub const SETTINGS_FILE: &str = "settings.yaml";

/// Where a settings value came from, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SettingsTier {
    Defaults,
    Project,
    User,
    Environment,
}

impl std::fmt::Display for SettingsTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SettingsTier::Defaults => "defaults",
            SettingsTier::Project => "project",
            SettingsTier::User => "user",
            SettingsTier::Environment => "environment",
        };
        f.write_str(name)
    }
}

/// Directories searched for [`SETTINGS_FILE`].
#[derive(Debug, Clone, Default)]
pub struct SettingsPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl SettingsPaths {
    /// `PROPGRAPH_PROJECT_DIR` or `./propgraph`, and `PROPGRAPH_USER_DIR` or `~/.propgraph`.
    pub fn discover() -> Self {
        let project_dir = std::env::var_os("PROPGRAPH_PROJECT_DIR")
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("propgraph")));
        let user_dir = std::env::var_os("PROPGRAPH_USER_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".propgraph")));
        Self {
            project_dir,
            user_dir,
        }
    }

    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }

    fn tier_files(&self) -> impl Iterator<Item = (SettingsTier, PathBuf)> + '_ {
        [
            (SettingsTier::Project, self.project_dir.as_ref()),
            (SettingsTier::User, self.user_dir.as_ref()),
        ]
        .into_iter()
        .filter_map(|(tier, dir)| dir.map(|d| (tier, d.join(SETTINGS_FILE))))
    }
}

/// Loads and merges [`Settings`] from every tier.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    paths: SettingsPaths,
    settings: Settings,
    sources: Vec<(SettingsTier, PathBuf)>,
}

impl SettingsLoader {
    pub fn load() -> Result<Self> {
        Self::load_with_paths(SettingsPaths::discover())
    }

    /// Load every tier found under `paths`, then apply environment overrides.
    ///
    /// Missing files are skipped; unreadable or malformed files are errors.
    pub fn load_with_paths(paths: SettingsPaths) -> Result<Self> {
        let mut tiers = vec![serde_json::to_value(Settings::default())?];
        let mut sources = Vec::new();

        for (tier, file) in paths.tier_files() {
            if let Some(value) = read_tier(&file)? {
                debug!(tier = %tier, path = %file.display(), "Loaded settings tier");
                tiers.push(value);
                sources.push((tier, file));
            }
        }

        let mut settings: Settings = serde_json::from_value(deep_merge(tiers))
            .context("settings do not match the expected schema")?;
        settings.apply_env_overrides(|name| std::env::var(name).ok());

        Ok(Self {
            paths,
            settings,
            sources,
        })
    }

    /// Load a single explicit file on top of the defaults, then apply
    /// environment overrides. Other tiers are ignored.
    pub fn load_file(path: &Path) -> Result<Self> {
        let value = read_tier(path)?
            .with_context(|| format!("settings file {} does not exist", path.display()))?;
        let merged = deep_merge([serde_json::to_value(Settings::default())?, value]);
        let mut settings: Settings = serde_json::from_value(merged)
            .with_context(|| format!("invalid settings in {}", path.display()))?;
        settings.apply_env_overrides(|name| std::env::var(name).ok());

        Ok(Self {
            paths: SettingsPaths::default(),
            settings,
            sources: vec![(SettingsTier::User, path.to_path_buf())],
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }

    pub fn paths(&self) -> &SettingsPaths {
        &self.paths
    }

    /// Files that contributed, lowest tier first.
    pub fn sources(&self) -> &[(SettingsTier, PathBuf)] {
        &self.sources
    }
}

fn read_tier(file: &Path) -> Result<Option<Value>> {
    if !file.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    if content.trim().is_empty() {
        warn!(path = %file.display(), "Settings file is empty");
        return Ok(None);
    }
    let value = serde_yaml::from_str::<Value>(&content)
        .with_context(|| format!("failed to parse {}", file.display()))?;
    Ok(Some(value))
}
