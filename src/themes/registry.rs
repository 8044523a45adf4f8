//! Theme registry with I/O abstraction.
//!
//! The `ThemeRegistry` trait loads and stores the persisted mapping of theme
//! identifiers to installed files. `JsonThemeRegistry` is the default
//! file-backed implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::types::{ThemeDescriptor, ThemeError, ThemesDocument};

/// Trait for reading and writing the themes registry.
///
/// This abstraction allows:
/// - Testing with in-memory implementations
/// - Registries owned by an external package manager
#[async_trait]
pub trait ThemeRegistry: Send + Sync {
    /// Load the full registry document.
    async fn load(&self) -> Result<ThemesDocument, ThemeError>;

    /// Replace the registry document.
    async fn store(&self, document: &ThemesDocument) -> Result<(), ThemeError>;

    /// Look up a descriptor by identifier or package name.
    async fn find(&self, key: &str) -> Result<Option<ThemeDescriptor>, ThemeError> {
        Ok(self.load().await?.find(key).cloned())
    }
}

/// Registry persisted as `{ "themes": [...] }` in a JSON file.
///
/// A missing file is an empty registry; an unparsable one is a `Read` error.
pub struct JsonThemeRegistry {
    path: PathBuf,
}

impl JsonThemeRegistry {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ThemeRegistry for JsonThemeRegistry {
    async fn load(&self) -> Result<ThemesDocument, ThemeError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Themes registry {} does not exist yet", self.path.display());
                return Ok(ThemesDocument::default());
            }
            Err(e) => {
                return Err(ThemeError::Read(format!("{}: {}", self.path.display(), e)));
            }
        };
        serde_json::from_str(&content)
            .map_err(|e| ThemeError::Read(format!("{}: {}", self.path.display(), e)))
    }

    async fn store(&self, document: &ThemesDocument) -> Result<(), ThemeError> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ThemeError::Store(format!("{}: {}", dir.display(), e)))?;
        }
        let json = serde_json::to_string_pretty(document)
            .map_err(|e| ThemeError::Store(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| ThemeError::Store(format!("{}: {}", self.path.display(), e)))
    }
}
