//! Custom resource schemes served to window content.
//!
//! Each scheme is a `SchemeResolver` registered in a `SchemeRegistry`. The
//! host's resource loader hands every request for a registered scheme to the
//! registry and turns the result into a response. Failures are always a
//! `ResourceNotFound`, which the host maps to the network error code
//! `NET_ERROR_FILE_NOT_FOUND`.

pub mod module_scheme;
pub mod theme_scheme;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use module_scheme::{ModuleSchemeResolver, MODULE_SCHEME};
pub use theme_scheme::{ThemeSchemeResolver, THEME_SCHEME};

/// Network error code for a missing file.
pub const NET_ERROR_FILE_NOT_FOUND: i32 = -6;

/// Fallback MIME type for unknown extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceBody {
    Bytes(Vec<u8>),
    Text(String),
}

impl ResourceBody {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ResourceBody::Bytes(bytes) => bytes,
            ResourceBody::Text(text) => text.as_bytes(),
        }
    }
}

/// A resolved resource ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub mime_type: String,
    pub charset: Option<&'static str>,
    pub body: ResourceBody,
}

impl Resource {
    pub fn bytes(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            charset: None,
            body: ResourceBody::Bytes(data),
        }
    }

    pub fn stylesheet(text: String) -> Self {
        Self {
            mime_type: "text/css".to_string(),
            charset: Some("utf8"),
            body: ResourceBody::Text(text),
        }
    }
}

/// The requested resource could not be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNotFound {
    /// What was requested or resolved
    pub location: String,
    pub reason: String,
}

impl ResourceNotFound {
    pub fn new(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// Code reported to the requester.
    pub fn net_error_code(&self) -> i32 {
        NET_ERROR_FILE_NOT_FOUND
    }
}

impl fmt::Display for ResourceNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resource not found: {} ({})", self.location, self.reason)
    }
}

impl std::error::Error for ResourceNotFound {}

/// Resolves requests for one custom scheme.
#[async_trait]
pub trait SchemeResolver: Send + Sync {
    /// Scheme name, without `://`
    fn scheme(&self) -> &str;

    /// Resolve the part of the URL after `<scheme>://`.
    async fn resolve(&self, path: &str) -> Result<Resource, ResourceNotFound>;
}

/// Registered scheme resolvers, keyed by scheme name.
#[derive(Default, Clone)]
pub struct SchemeRegistry {
    resolvers: HashMap<String, Arc<dyn SchemeResolver>>,
}

impl SchemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver, replacing any previous one for its scheme.
    pub fn register(&mut self, resolver: Arc<dyn SchemeResolver>) {
        tracing::debug!("Registering {} protocol", resolver.scheme());
        self.resolvers.insert(resolver.scheme().to_string(), resolver);
    }

    pub fn schemes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resolvers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub async fn resolve(&self, scheme: &str, path: &str) -> Result<Resource, ResourceNotFound> {
        let Some(resolver) = self.resolvers.get(scheme) else {
            return Err(ResourceNotFound::new(
                format!("{scheme}://{path}"),
                "unknown scheme",
            ));
        };
        let result = resolver.resolve(path).await;
        if let Err(e) = &result {
            tracing::error!("{}", e);
        }
        result
    }

    /// Resolve a full `<scheme>://<path>` URL.
    pub async fn resolve_url(&self, url: &str) -> Result<Resource, ResourceNotFound> {
        match url.split_once("://") {
            Some((scheme, path)) => self.resolve(scheme, path).await,
            None => Err(ResourceNotFound::new(url, "not a scheme URL")),
        }
    }
}

impl fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}
