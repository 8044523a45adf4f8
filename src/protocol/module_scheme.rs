//! The `web-module` scheme: application sources and bundled packages.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{Resource, ResourceNotFound, SchemeResolver};

pub const MODULE_SCHEME: &str = "web-module";

/// Directories under the application root searched in order.
pub const DEFAULT_MODULE_PREFIXES: [&str; 3] = ["src", "web_modules", "node_modules"];

/// Serves files from the first prefix directory that contains them.
#[derive(Debug, Clone)]
pub struct ModuleSchemeResolver {
    app_root: PathBuf,
    prefixes: Vec<PathBuf>,
}

impl ModuleSchemeResolver {
    /// Resolver over the default prefixes under `app_root`.
    pub fn new(app_root: PathBuf) -> Self {
        let prefixes = DEFAULT_MODULE_PREFIXES
            .iter()
            .map(|prefix| app_root.join(prefix))
            .collect();
        Self { app_root, prefixes }
    }

    /// Resolver with explicit prefix directories, searched in the given order.
    pub fn with_prefixes(app_root: PathBuf, prefixes: Vec<PathBuf>) -> Self {
        Self { app_root, prefixes }
    }

    pub fn prefixes(&self) -> &[PathBuf] {
        &self.prefixes
    }

    /// File location for a request path.
    ///
    /// The first prefix where the file exists wins. With no match the path is
    /// joined to the application root, whether or not it exists.
    pub fn locate(&self, request_path: &str) -> PathBuf {
        let relative = normalize_request_path(request_path);
        for prefix in &self.prefixes {
            let candidate = prefix.join(&relative);
            if candidate.exists() {
                return candidate;
            }
        }
        self.app_root.join(&relative)
    }
}

/// Drop query and fragment, strip leading slashes, percent-decode.
fn normalize_request_path(request_path: &str) -> String {
    let end = request_path
        .find(['?', '#'])
        .unwrap_or(request_path.len());
    let trimmed = request_path[..end].trim_start_matches('/');
    match urlencoding::decode(trimmed) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => trimmed.to_string(),
    }
}

fn mime_type_for(location: &Path) -> String {
    mime_guess::from_path(location)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[async_trait]
impl SchemeResolver for ModuleSchemeResolver {
    fn scheme(&self) -> &str {
        MODULE_SCHEME
    }

    async fn resolve(&self, path: &str) -> Result<Resource, ResourceNotFound> {
        let location = self.locate(path);
        tracing::debug!("Loading: {}", location.display());
        match tokio::fs::read(&location).await {
            Ok(data) => Ok(Resource::bytes(mime_type_for(&location), data)),
            Err(e) => Err(ResourceNotFound::new(
                location.display().to_string(),
                e.to_string(),
            )),
        }
    }
}
