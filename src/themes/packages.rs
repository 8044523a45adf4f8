//! Installable theme package service seam.
//!
//! Downloading, unpacking and registering theme packages belongs to an external
//! package manager. The shell only talks to it through `PackageService`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A package that was installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
}

/// An available update reported by the package service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeUpdate {
    pub name: String,
    pub version: String,
}

/// Per-item result of applying updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub name: String,
    /// Present when this item failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateOutcome {
    pub fn success(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: None,
        }
    }

    pub fn failure(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: Some(message.into()),
        }
    }
}

/// Operations offered by the theme package manager.
#[async_trait]
pub trait PackageService: Send + Sync {
    /// Install `name`, optionally pinned to `version`.
    async fn install(&self, name: &str, version: Option<&str>) -> anyhow::Result<InstalledPackage>;

    /// Remove an installed package.
    async fn uninstall(&self, name: &str) -> anyhow::Result<()>;

    /// List installed packages with a newer version available.
    async fn check_for_updates(&self) -> anyhow::Result<Vec<ThemeUpdate>>;

    /// Apply the given updates.
    async fn update(&self, items: &[ThemeUpdate]) -> anyhow::Result<Vec<UpdateOutcome>>;
}

/// Package service used when no package manager backend is attached.
///
/// Reports no updates and rejects installs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedPackageService;

#[async_trait]
impl PackageService for DetachedPackageService {
    async fn install(
        &self,
        name: &str,
        _version: Option<&str>,
    ) -> anyhow::Result<InstalledPackage> {
        anyhow::bail!("Cannot install {name}: no theme package manager is available")
    }

    async fn uninstall(&self, name: &str) -> anyhow::Result<()> {
        anyhow::bail!("Cannot uninstall {name}: no theme package manager is available")
    }

    async fn check_for_updates(&self) -> anyhow::Result<Vec<ThemeUpdate>> {
        Ok(Vec::new())
    }

    async fn update(&self, items: &[ThemeUpdate]) -> anyhow::Result<Vec<UpdateOutcome>> {
        Ok(items
            .iter()
            .map(|item| UpdateOutcome::failure(&item.name, "no theme package manager is available"))
            .collect())
    }
}
