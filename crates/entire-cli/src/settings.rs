//! Repository settings.
//!
//! `.entire/settings.json` with an optional `.entire/settings.local.json`
//! overlay. Both files reject unknown keys; `strategy_options` merges
//! shallowly with the local file winning per key.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const SETTINGS_DIR: &str = ".entire";
pub const SETTINGS_FILE: &str = "settings.json";
pub const LOCAL_SETTINGS_FILE: &str = "settings.local.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Master switch; hooks exit silently when off.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub local_dev: bool,

    /// Free-form per-strategy knobs.
    #[serde(default)]
    pub strategy_options: serde_json::Map<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            local_dev: false,
            strategy_options: serde_json::Map::new(),
        }
    }
}

/// The local overlay: every field optional so "not present" and "present
/// with the default value" stay distinguishable.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsOverlay {
    enabled: Option<bool>,
    local_dev: Option<bool>,
    strategy_options: Option<serde_json::Map<String, serde_json::Value>>,
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Load settings for a worktree. Missing files mean defaults; files
    /// with unknown keys are load errors.
    pub fn load(worktree_root: &Path) -> Result<Self> {
        let dir = worktree_root.join(SETTINGS_DIR);

        let base_path = dir.join(SETTINGS_FILE);
        let mut settings = match fs::read_to_string(&base_path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Invalid settings file: {}", base_path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read {}", base_path.display()));
            }
        };

        let local_path = dir.join(LOCAL_SETTINGS_FILE);
        let overlay: SettingsOverlay = match fs::read_to_string(&local_path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Invalid settings file: {}", local_path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => SettingsOverlay::default(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read {}", local_path.display()));
            }
        };

        if let Some(enabled) = overlay.enabled {
            settings.enabled = enabled;
        }
        if let Some(local_dev) = overlay.local_dev {
            settings.local_dev = local_dev;
        }
        if let Some(options) = overlay.strategy_options {
            for (key, value) in options {
                settings.strategy_options.insert(key, value);
            }
        }
        Ok(settings)
    }
}
