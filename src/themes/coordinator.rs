//! Theme activation, installation and background updates.
//!
//! The coordinator answers theme requests coming from windows. It never
//! reloads windows itself: activating or updating a theme takes effect when
//! the caller broadcasts a reload or the user reloads a window.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::packages::{InstalledPackage, PackageService, UpdateOutcome};
use super::registry::ThemeRegistry;
use super::types::{ThemeDescriptor, ThemeError, DEFAULT_THEME_ID};
use crate::config_io::PreferencesStore;

/// Delay before the first update check, keeping it clear of application start-up.
pub const DEFAULT_UPDATE_DEBOUNCE: Duration = Duration::from_secs(10);

const DEFAULT_THEME_MISSING: &str = "default theme missing";

#[derive(Debug, Clone)]
pub struct ThemeOptions {
    /// Do not schedule the background update check
    pub skip_update_check: bool,
    /// Delay before the background update check runs
    pub update_debounce: Duration,
    /// Theme used when the selection is absent or broken
    pub default_theme: String,
}

impl Default for ThemeOptions {
    fn default() -> Self {
        Self {
            skip_update_check: false,
            update_debounce: DEFAULT_UPDATE_DEBOUNCE,
            default_theme: DEFAULT_THEME_ID.to_string(),
        }
    }
}

/// Result of one background update cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Number of updates the package service reported
    pub available: usize,
    /// Names of packages updated successfully
    pub updated: Vec<String>,
    /// Items that failed, with their error messages
    pub failed: Vec<UpdateOutcome>,
}

pub struct ThemeCoordinator {
    preferences: Arc<dyn PreferencesStore>,
    registry: Arc<dyn ThemeRegistry>,
    packages: Arc<dyn PackageService>,
    default_theme: String,
    update_task: Option<JoinHandle<UpdateReport>>,
}

impl ThemeCoordinator {
    /// Create the coordinator and, unless skipped, schedule the debounced update check.
    ///
    /// Must be called inside a tokio runtime when the update check is scheduled.
    pub fn new(
        preferences: Arc<dyn PreferencesStore>,
        registry: Arc<dyn ThemeRegistry>,
        packages: Arc<dyn PackageService>,
        options: ThemeOptions,
    ) -> Self {
        let update_task = if options.skip_update_check {
            tracing::debug!("Themes update check skipped");
            None
        } else {
            let packages = Arc::clone(&packages);
            let delay = options.update_debounce;
            Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                run_update_check(packages.as_ref()).await
            }))
        };

        Self {
            preferences,
            registry,
            packages,
            default_theme: options.default_theme,
            update_task,
        }
    }

    pub fn default_theme(&self) -> &str {
        &self.default_theme
    }

    /// Take the handle of the scheduled update check, if one was scheduled.
    ///
    /// Dropping the handle does not cancel the check.
    pub fn take_update_task(&mut self) -> Option<JoinHandle<UpdateReport>> {
        self.update_task.take()
    }

    /// All installed themes.
    pub async fn list_themes(&self) -> Result<Vec<ThemeDescriptor>, ThemeError> {
        Ok(self.registry.load().await?.themes)
    }

    /// Descriptor of the active theme, falling back to the default theme.
    ///
    /// A missing custom selection falls back to the default theme; a missing
    /// default theme is an error.
    pub async fn active_theme_info(&self) -> Result<ThemeDescriptor, ThemeError> {
        let selected = match self.preferences.load().await {
            Ok(settings) => settings.theme.filter(|id| !id.is_empty()),
            Err(e) => {
                tracing::error!("Unable to read settings, using the default theme: {}", e);
                None
            }
        };
        let theme_id = selected.unwrap_or_else(|| self.default_theme.clone());

        let document = self.registry.load().await?;
        if let Some(theme) = document.find(&theme_id) {
            return Ok(theme.clone());
        }
        if theme_id == self.default_theme {
            return Err(ThemeError::NotFound(DEFAULT_THEME_MISSING.to_string()));
        }

        tracing::warn!(
            "Selected theme {} is not installed, falling back to {}",
            theme_id,
            self.default_theme
        );
        document
            .find(&self.default_theme)
            .cloned()
            .ok_or_else(|| ThemeError::NotFound(DEFAULT_THEME_MISSING.to_string()))
    }

    /// Store `id` as the active theme.
    pub async fn activate(&self, id: &str) -> Result<(), ThemeError> {
        let mut settings = self
            .preferences
            .load()
            .await
            .map_err(|e| ThemeError::Read(e.to_string()))?;
        settings.theme = Some(id.to_string());
        self.preferences
            .store(&settings)
            .await
            .map_err(|e| ThemeError::Store(e.to_string()))?;
        tracing::info!("Activated theme {}", id);
        Ok(())
    }

    /// Install a theme package given as `name` or `name#version`.
    pub async fn install(&self, spec: &str) -> Result<InstalledPackage, ThemeError> {
        let (name, version) = parse_package_spec(spec)?;
        tracing::info!("Installing theme {}", spec);
        self.packages
            .install(name, version)
            .await
            .map_err(|e| ThemeError::Package(format!("{e:#}")))
    }

    /// Uninstall a theme package.
    pub async fn uninstall(&self, name: &str) -> Result<(), ThemeError> {
        if name.is_empty() {
            return Err(ThemeError::InvalidArgument("The name is not valid.".to_string()));
        }
        tracing::info!("Uninstalling theme {}", name);
        self.packages
            .uninstall(name)
            .await
            .map_err(|e| ThemeError::Package(format!("{e:#}")))
    }

    /// Run the update check immediately.
    pub async fn check_for_updates_now(&self) -> UpdateReport {
        run_update_check(self.packages.as_ref()).await
    }
}

/// Split `name#version` into its parts. An empty version means "latest".
fn parse_package_spec(spec: &str) -> Result<(&str, Option<&str>), ThemeError> {
    let (name, version) = match spec.split_once('#') {
        Some((name, version)) => (name, Some(version).filter(|v| !v.is_empty())),
        None => (spec, None),
    };
    if name.is_empty() {
        return Err(ThemeError::InvalidArgument("The name is not valid.".to_string()));
    }
    Ok((name, version))
}

/// Query the package service and apply every available update.
///
/// Items are applied one at a time so a failure cannot stop the rest.
async fn run_update_check(packages: &dyn PackageService) -> UpdateReport {
    tracing::debug!("Checking for themes updates...");
    let mut report = UpdateReport::default();

    let available = match packages.check_for_updates().await {
        Ok(available) => available,
        Err(e) => {
            tracing::error!("Themes update check failed: {:#}", e);
            return report;
        }
    };
    report.available = available.len();
    if available.is_empty() {
        tracing::debug!("Themes update not available.");
        return report;
    }

    tracing::debug!("Updating {} themes...", available.len());
    for item in &available {
        match packages.update(std::slice::from_ref(item)).await {
            Ok(outcomes) => {
                for outcome in outcomes {
                    match &outcome.error {
                        Some(message) => {
                            tracing::info!("Theme {} update error: {}", outcome.name, message);
                            report.failed.push(outcome);
                        }
                        None => report.updated.push(outcome.name),
                    }
                }
            }
            Err(e) => {
                tracing::info!("Theme {} update error: {:#}", item.name, e);
                report
                    .failed
                    .push(UpdateOutcome::failure(&item.name, format!("{e:#}")));
            }
        }
    }

    tracing::info!("Themes updated. The change will be applied with next app reload.");
    report
}
