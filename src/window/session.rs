//! Per-window session geometry persistence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::ConfigError;

pub const DEFAULT_WINDOW_WIDTH: u32 = 1200;
pub const DEFAULT_WINDOW_HEIGHT: u32 = 800;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPosition {
    /// Unset lets the host place the window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_WINDOW_WIDTH,
            height: DEFAULT_WINDOW_HEIGHT,
        }
    }
}

/// Geometry remembered for one window index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionGeometry {
    #[serde(default)]
    pub position: WindowPosition,
    #[serde(default)]
    pub size: WindowSize,
}

impl SessionGeometry {
    pub fn at(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            position: WindowPosition {
                x: Some(x),
                y: Some(y),
            },
            size: WindowSize { width, height },
        }
    }
}

/// Durable storage of window geometry keyed by window index.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Geometry for `index`; defaults when nothing was stored.
    async fn load(&self, index: usize) -> Result<SessionGeometry, ConfigError>;

    async fn store(&self, index: usize, geometry: &SessionGeometry) -> Result<(), ConfigError>;
}

/// One JSON file per window index under a sessions directory.
pub struct JsonSessionStore {
    dir: PathBuf,
}

impl JsonSessionStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir.join(format!("window-{index}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl SessionStore for JsonSessionStore {
    async fn load(&self, index: usize) -> Result<SessionGeometry, ConfigError> {
        let path = self.path_for(index);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionGeometry::default()),
            Err(e) => Err(ConfigError::Io(format!("{}: {}", path.display(), e))),
        }
    }

    async fn store(&self, index: usize, geometry: &SessionGeometry) -> Result<(), ConfigError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ConfigError::Io(format!("{}: {}", self.dir.display(), e)))?;
        let path = self.path_for(index);
        let json = serde_json::to_string_pretty(geometry)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))
    }
}
