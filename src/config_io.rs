//! Runtime configuration I/O.
//!
//! Directory detection and the preferences store. These need runtime
//! dependencies (dirs, tokio, tracing) and stay separate from `config.rs`.

use crate::config::{ConfigError, Settings, StartupOptions};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, Mutex};

/// Application directory name used under platform directories.
pub const APP_DIR_NAME: &str = "deskshell";

/// Name of the portable home directory placed next to the application directory.
const PORTABLE_HOME_NAME: &str = ".deskshell";

/// Default file name of the themes registry inside the themes directory.
pub const THEMES_REGISTRY_FILENAME: &str = "themes-info.json";

/// Resolved locations of everything the shell persists or serves.
#[derive(Debug, Clone)]
pub struct DirectoryContext {
    /// Root for all persistent state (settings, sessions, default themes location)
    pub home_dir: PathBuf,

    /// Settings document
    pub settings_file: PathBuf,

    /// Installed themes base directory; descriptors' `mainFile` is relative to it
    pub themes_dir: PathBuf,

    /// Themes registry document
    pub themes_registry_file: PathBuf,

    /// Application source root served by the module scheme
    pub app_root: PathBuf,
}

impl DirectoryContext {
    /// Resolve directories from the system and the start-up options,
    /// creating requested override directories on the way.
    /// This should ONLY be called from main()
    pub fn from_system(options: &StartupOptions) -> std::io::Result<Self> {
        Self::build(options, true)
    }

    /// Same paths as `from_system` without touching the filesystem.
    pub fn resolve(options: &StartupOptions) -> std::io::Result<Self> {
        Self::build(options, false)
    }

    fn build(options: &StartupOptions, create: bool) -> std::io::Result<Self> {
        let home_dir = match &options.user_data_dir {
            Some(dir) => expand_home(dir),
            None => Self::detect_home()?,
        };

        let settings_file =
            Self::settings_file_for(&home_dir, options.settings_file.as_deref(), create);
        let themes_dir = Self::themes_dir_for(&home_dir, options.themes_path.as_deref(), create);
        let themes_registry_file = themes_dir.join(THEMES_REGISTRY_FILENAME);

        let app_root = match &options.app_root {
            Some(root) => expand_home(root),
            None => executable_dir().unwrap_or_else(|| PathBuf::from(".")),
        };

        tracing::debug!("The home path is set to: {}", home_dir.display());
        tracing::debug!("The settings file is set to: {}", settings_file.display());
        tracing::debug!("Themes path is set to: {}", themes_dir.display());
        tracing::debug!("Themes registry is set to: {}", themes_registry_file.display());

        Ok(Self {
            home_dir,
            settings_file,
            themes_dir,
            themes_registry_file,
            app_root,
        })
    }

    /// Create a DirectoryContext for testing with a temp directory
    /// All paths point to subdirectories within the provided temp_dir
    pub fn for_testing(temp_dir: &Path) -> Self {
        let home_dir = temp_dir.join("home");
        let themes_dir = home_dir.join("themes-esm");
        Self {
            settings_file: home_dir.join("settings.json"),
            themes_registry_file: themes_dir.join(THEMES_REGISTRY_FILENAME),
            themes_dir,
            app_root: temp_dir.join("app"),
            home_dir,
        }
    }

    /// Directory holding per-window session geometry.
    pub fn sessions_dir(&self) -> PathBuf {
        self.home_dir.join("sessions")
    }

    /// Portable home wins when it exists next to the application and is writable;
    /// otherwise the platform data directory is used.
    fn detect_home() -> std::io::Result<PathBuf> {
        if let Some(app_dir) = executable_dir() {
            let portable = app_dir.join("..").join(PORTABLE_HOME_NAME);
            if portable.is_dir() {
                if has_write_access(&portable) {
                    return Ok(portable);
                }
                tracing::error!(
                    "Insufficient permission to portable home \"{}\".",
                    portable.display()
                );
            }
        }

        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Could not determine data directory",
                )
            })
    }

    fn settings_file_for(home_dir: &Path, requested: Option<&Path>, create: bool) -> PathBuf {
        if let Some(file) = requested {
            let file = expand_home(file);
            if !create {
                return file;
            }
            match file.parent() {
                Some(dir) if std::fs::create_dir_all(dir).is_err() => {
                    tracing::error!(
                        "Insufficient permission to settings file folder \"{}\".",
                        dir.display()
                    );
                }
                _ => return file,
            }
        }
        home_dir.join("settings.json")
    }

    fn themes_dir_for(home_dir: &Path, requested: Option<&Path>, create: bool) -> PathBuf {
        if let Some(dir) = requested {
            let dir = expand_home(dir);
            if !create || std::fs::create_dir_all(&dir).is_ok() {
                return dir;
            }
            tracing::error!(
                "Insufficient permission to themes installation location \"{}\".",
                dir.display()
            );
        }
        home_dir.join("themes-esm")
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

fn executable_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

fn has_write_access(dir: &Path) -> bool {
    let marker = dir.join("write.test");
    let writable = std::fs::write(&marker, chrono::Local::now().to_rfc3339()).is_ok();
    if writable {
        let _ = std::fs::remove_file(&marker);
    }
    writable
}

/// A top-level settings key whose value changed.
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceChange {
    pub name: String,
    pub value: serde_json::Value,
}

/// Key-value store for user preferences.
///
/// Loads and stores are suspension points; change notifications are delivered
/// to every subscriber for each key modified by `store`.
#[async_trait]
pub trait PreferencesStore: Send + Sync {
    /// Load the current settings.
    async fn load(&self) -> Result<Settings, ConfigError>;

    /// Persist `settings` as the new current settings.
    async fn store(&self, settings: &Settings) -> Result<(), ConfigError>;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<PreferenceChange>;
}

/// Preferences persisted as a JSON document on disk.
pub struct JsonPreferencesStore {
    path: PathBuf,
    changes: broadcast::Sender<PreferenceChange>,
    /// Serializes read-modify-write of the file within this process
    write_lock: Mutex<()>,
}

impl JsonPreferencesStore {
    pub fn new(path: PathBuf) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            path,
            changes,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Settings, ConfigError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Settings::from_json(&content)
                .map_err(|e| ConfigError::Parse(format!("{}: {}", self.path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(ConfigError::Io(format!("{}: {}", self.path.display(), e))),
        }
    }
}

#[async_trait]
impl PreferencesStore for JsonPreferencesStore {
    async fn load(&self) -> Result<Settings, ConfigError> {
        self.read().await
    }

    async fn store(&self, settings: &Settings) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().await;

        // A corrupt previous document is replaced; every key then counts as changed
        let previous = self.read().await.unwrap_or_default();

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ConfigError::Io(format!("{}: {}", dir.display(), e)))?;
        }
        let json = settings.to_json()?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| ConfigError::Io(format!("{}: {}", self.path.display(), e)))?;

        for (name, value) in previous.changed_keys(settings) {
            tracing::debug!("Preference changed: {}", name);
            // No subscribers is fine
            let _ = self.changes.send(PreferenceChange { name, value });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PreferenceChange> {
        self.changes.subscribe()
    }
}
