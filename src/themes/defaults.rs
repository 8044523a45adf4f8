//! Prepares the on-disk theme environment at start-up.

use crate::config_io::DirectoryContext;

use super::registry::{JsonThemeRegistry, ThemeRegistry};
use super::types::{ThemeError, ThemesDocument};

/// Create the themes directory and an empty registry when none exists.
///
/// An existing registry is left untouched, even when it cannot be parsed.
pub async fn prepare_environment(dirs: &DirectoryContext) -> Result<(), ThemeError> {
    tokio::fs::create_dir_all(&dirs.themes_dir)
        .await
        .map_err(|e| ThemeError::Store(format!("{}: {}", dirs.themes_dir.display(), e)))?;

    match tokio::fs::try_exists(&dirs.themes_registry_file).await {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::info!(
                "Creating themes registry {}",
                dirs.themes_registry_file.display()
            );
            JsonThemeRegistry::new(dirs.themes_registry_file.clone())
                .store(&ThemesDocument::default())
                .await
        }
        Err(e) => Err(ThemeError::Read(format!(
            "{}: {}",
            dirs.themes_registry_file.display(),
            e
        ))),
    }
}
