//! Settings document and start-up options.
//!
//! `Settings` mirrors the persisted settings file. Only the keys the shell core
//! reads are typed; everything else is kept in `extra` so a load/store cycle
//! never drops keys owned by other parts of the application.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Value of `colorProfile` that leaves the host's colour handling untouched.
pub const DEFAULT_COLOR_PROFILE: &str = "default";

/// Persisted user settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Identifier of the active theme
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,

    /// Colour profile forced onto the host renderer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_profile: Option<String>,

    /// Release channel used by the auto-updater
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_channel: Option<String>,

    /// Keys this crate does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Settings {
    /// Parse a settings document from JSON text.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Top-level keys whose value differs between `self` and `other`.
    ///
    /// Keys removed in `other` are reported with a `null` value.
    pub fn changed_keys(&self, other: &Settings) -> Vec<(String, serde_json::Value)> {
        let before = serde_json::to_value(self).unwrap_or_default();
        let after = serde_json::to_value(other).unwrap_or_default();
        let empty = serde_json::Map::new();
        let before = before.as_object().unwrap_or(&empty);
        let after = after.as_object().unwrap_or(&empty);

        let mut changes: Vec<(String, serde_json::Value)> = after
            .iter()
            .filter(|(key, value)| before.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for key in before.keys() {
            if !after.contains_key(key) {
                changes.push((key.clone(), serde_json::Value::Null));
            }
        }
        changes
    }

    /// Host switches implied by these settings.
    pub fn host_switches(&self) -> Vec<HostSwitch> {
        let mut switches = Vec::new();
        if let Some(profile) = self
            .color_profile
            .as_deref()
            .filter(|p| !p.is_empty() && *p != DEFAULT_COLOR_PROFILE)
        {
            switches.push(HostSwitch {
                name: "force-color-profile".to_string(),
                value: Some(profile.to_string()),
            });
        }
        switches
    }
}

/// A command-line switch appended to the host renderer before windows open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSwitch {
    pub name: String,
    pub value: Option<String>,
}

/// Options the shell was started with.
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    /// Verbose logging
    pub debug: bool,
    /// Log level used when `debug` is set
    pub debug_level: Option<String>,
    /// Open developer tools in every new window
    pub with_devtools: bool,
    /// Do not run the background theme update check
    pub skip_themes_update: bool,
    /// Do not run the application auto-updater
    pub skip_app_update: bool,
    /// Settings file override
    pub settings_file: Option<PathBuf>,
    /// Themes installation directory override
    pub themes_path: Option<PathBuf>,
    /// Home directory override
    pub user_data_dir: Option<PathBuf>,
    /// Application root override for the module scheme
    pub app_root: Option<PathBuf>,
    /// Internal route for the first window
    pub open: Option<String>,
}

impl StartupOptions {
    /// Log filter directive implied by the options.
    pub fn log_level(&self) -> &str {
        if self.debug {
            self.debug_level.as_deref().unwrap_or("debug")
        } else {
            "info"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Serialize(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO error: {msg}"),
            ConfigError::Parse(msg) => write!(f, "Parse error: {msg}"),
            ConfigError::Serialize(msg) => write!(f, "Serialize error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
