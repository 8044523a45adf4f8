//! The `themes` scheme: stylesheets by file path or by installed theme.
//!
//! Resolution is a short chain. A value naming a readable file is served
//! directly. Anything else is looked up in the themes registry and the
//! descriptor's main file is served. Every failure along the way ends as
//! `ResourceNotFound`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Resource, ResourceNotFound, SchemeResolver};
use crate::themes::registry::ThemeRegistry;
use crate::themes::types::ThemeDescriptor;

pub const THEME_SCHEME: &str = "themes";

/// Unscoped package prefix used by older theme references.
const LEGACY_PACKAGE_PREFIX: &str = "advanced-rest-client/";

pub struct ThemeSchemeResolver {
    themes_dir: PathBuf,
    registry: Arc<dyn ThemeRegistry>,
}

impl ThemeSchemeResolver {
    pub fn new(themes_dir: PathBuf, registry: Arc<dyn ThemeRegistry>) -> Self {
        Self {
            themes_dir,
            registry,
        }
    }

    async fn load_file_theme(&self, location: &Path) -> Result<Resource, ResourceNotFound> {
        tracing::trace!("Loading theme from {}", location.display());
        tokio::fs::read_to_string(location)
            .await
            .map(Resource::stylesheet)
            .map_err(|e| ResourceNotFound::new(location.display().to_string(), e.to_string()))
    }

    async fn load_installed_theme(&self, id: &str) -> Result<Resource, ResourceNotFound> {
        tracing::info!("Loading theme {}", id);
        let id = normalize_theme_id(id);
        let Some(theme) = self.find_theme(&id).await else {
            return Err(ResourceNotFound::new(id, "theme info not found"));
        };

        let file = self.themes_dir.join(&theme.main_file);
        tracing::trace!("Theme found. Reading theme file: {}", file.display());
        let data = tokio::fs::read_to_string(&file)
            .await
            .map_err(|e| ResourceNotFound::new(file.display().to_string(), e.to_string()))?;
        if data.is_empty() {
            return Err(ResourceNotFound::new(
                file.display().to_string(),
                "theme file is empty",
            ));
        }
        Ok(Resource::stylesheet(data))
    }

    async fn find_theme(&self, id: &str) -> Option<ThemeDescriptor> {
        match self.registry.load().await {
            Ok(document) => document.find(id).cloned(),
            Err(e) => {
                tracing::warn!("Themes registry unavailable: {}", e);
                None
            }
        }
    }
}

/// Rewrite the legacy unscoped form into its scoped package name.
fn normalize_theme_id(id: &str) -> String {
    if id.starts_with(LEGACY_PACKAGE_PREFIX) {
        format!("@{id}")
    } else {
        id.to_string()
    }
}

/// True when `path` is a file this process may read and execute.
#[cfg(unix)]
fn is_accessible_file(path: &Path) -> bool {
    use nix::unistd::{access, AccessFlags};
    path.is_file() && access(path, AccessFlags::R_OK | AccessFlags::X_OK).is_ok()
}

#[cfg(not(unix))]
fn is_accessible_file(path: &Path) -> bool {
    path.is_file()
}

#[async_trait]
impl SchemeResolver for ThemeSchemeResolver {
    fn scheme(&self) -> &str {
        THEME_SCHEME
    }

    async fn resolve(&self, path: &str) -> Result<Resource, ResourceNotFound> {
        tracing::trace!("Theme request: {}", path);
        let direct = Path::new(path);
        if !path.is_empty() && is_accessible_file(direct) {
            return self.load_file_theme(direct).await;
        }
        self.load_installed_theme(path).await
    }
}
