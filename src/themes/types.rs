//! Theme registry data types.

use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of the theme used when no selection exists or the selection is broken.
pub const DEFAULT_THEME_ID: &str = "advanced-rest-client/apic-electron-default-theme";

/// One installed theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeDescriptor {
    /// Stable identifier
    #[serde(rename = "_id")]
    pub id: String,

    /// Package name the theme was installed under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Stylesheet path relative to the themes base directory
    #[serde(rename = "mainFile")]
    pub main_file: String,

    #[serde(default)]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(
        default,
        rename = "isDefault",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub is_default: bool,

    /// Fields written by the package manager that the shell does not read
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ThemeDescriptor {
    pub fn new(
        id: impl Into<String>,
        main_file: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            main_file: main_file.into(),
            version: version.into(),
            title: None,
            description: None,
            is_default: false,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// True when `key` is this theme's identifier or package name.
    pub fn matches(&self, key: &str) -> bool {
        self.id == key || self.name.as_deref() == Some(key)
    }
}

/// The persisted registry document: `{ "themes": [ ... ] }`.
///
/// Entries are read one at a time. An entry without `_id` is keyed by its
/// `name`; an entry that still does not parse is skipped with a warning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemesDocument {
    #[serde(default, deserialize_with = "deserialize_entries")]
    pub themes: Vec<ThemeDescriptor>,
}

fn deserialize_entries<'de, D>(deserializer: D) -> Result<Vec<ThemeDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .enumerate()
        .filter_map(|(position, mut entry)| {
            if let Some(object) = entry.as_object_mut() {
                if !object.contains_key("_id") {
                    if let Some(name) = object.get("name").cloned() {
                        object.insert("_id".to_string(), name);
                    }
                }
            }
            match serde_json::from_value(entry) {
                Ok(descriptor) => Some(descriptor),
                Err(e) => {
                    tracing::warn!("Skipping themes registry entry {}: {}", position, e);
                    None
                }
            }
        })
        .collect())
}

impl ThemesDocument {
    /// First descriptor whose identifier or package name equals `key`.
    pub fn find(&self, key: &str) -> Option<&ThemeDescriptor> {
        self.themes.iter().find(|theme| theme.matches(key))
    }

    /// Replace the descriptor with the same identifier, or append.
    pub fn upsert(&mut self, descriptor: ThemeDescriptor) {
        match self.themes.iter_mut().find(|t| t.id == descriptor.id) {
            Some(existing) => *existing = descriptor,
            None => self.themes.push(descriptor),
        }
    }

    /// Remove every descriptor matching `key`; returns whether anything was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.themes.len();
        self.themes.retain(|theme| !theme.matches(key));
        self.themes.len() != before
    }
}

/// Errors surfaced by theme operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeError {
    /// Missing theme or descriptor
    NotFound(String),
    /// Bad install/uninstall argument
    InvalidArgument(String),
    /// Registry could not be read or parsed
    Read(String),
    /// Settings or registry could not be written
    Store(String),
    /// The package service failed
    Package(String),
}

impl std::fmt::Display for ThemeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThemeError::NotFound(msg) => write!(f, "Not found: {msg}"),
            ThemeError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            ThemeError::Read(msg) => write!(f, "Read error: {msg}"),
            ThemeError::Store(msg) => write!(f, "Store error: {msg}"),
            ThemeError::Package(msg) => write!(f, "Package error: {msg}"),
        }
    }
}

impl std::error::Error for ThemeError {}
