// Host and package-service doubles shared by integration tests

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deskshell::config::{ConfigError, StartupOptions};
use deskshell::config_io::DirectoryContext;
use deskshell::environment::{AppEnvironment, Collaborators};
use deskshell::ipc::Broadcast;
use deskshell::themes::packages::{InstalledPackage, PackageService, ThemeUpdate, UpdateOutcome};
use deskshell::themes::{JsonThemeRegistry, ThemeDescriptor, ThemeOptions, ThemesDocument};
use deskshell::window::session::{SessionGeometry, SessionStore};
use deskshell::window::{ContentsId, ExternalOpener, NativeTheme, ShellWindow, WindowFactory};

/// A window that records everything the shell asks it to do
pub struct FakeWindow {
    pub id: ContentsId,
    pub index: usize,
    destroyed: AtomicBool,
    received: Mutex<Vec<Broadcast>>,
    actions: Mutex<Vec<&'static str>>,
}

impl FakeWindow {
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<Broadcast> {
        self.received.lock().unwrap().clone()
    }

    pub fn received_kinds(&self) -> Vec<&'static str> {
        self.received().iter().map(Broadcast::kind).collect()
    }

    pub fn actions(&self) -> Vec<&'static str> {
        self.actions.lock().unwrap().clone()
    }

    fn act(&self, action: &'static str) {
        if !self.destroyed.load(Ordering::SeqCst) {
            self.actions.lock().unwrap().push(action);
        }
    }
}

impl ShellWindow for FakeWindow {
    fn contents_id(&self) -> ContentsId {
        self.id
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn send(&self, message: &Broadcast) {
        assert!(!self.is_destroyed(), "message sent to a destroyed window");
        self.received.lock().unwrap().push(message.clone());
    }

    fn show(&self) {
        self.act("show");
    }

    fn load_shell_page(&self) {
        self.act("load");
    }

    fn reload(&self) {
        self.act("reload");
    }

    fn toggle_dev_tools(&self) {
        self.act("toggle-devtools");
    }

    fn open_dev_tools(&self) {
        self.act("devtools");
    }
}

/// Creates `FakeWindow`s with increasing content ids
#[derive(Default)]
pub struct FakeWindowFactory {
    next_id: AtomicU64,
    created: Mutex<Vec<Arc<FakeWindow>>>,
}

impl FakeWindowFactory {
    /// Windows in creation order
    pub fn created(&self) -> Vec<Arc<FakeWindow>> {
        self.created.lock().unwrap().clone()
    }

    pub fn nth(&self, position: usize) -> Arc<FakeWindow> {
        Arc::clone(&self.created.lock().unwrap()[position])
    }

    pub fn last(&self) -> Arc<FakeWindow> {
        let created = self.created.lock().unwrap();
        Arc::clone(created.last().expect("no window created"))
    }
}

impl WindowFactory for FakeWindowFactory {
    fn create(
        &self,
        index: usize,
        _geometry: &SessionGeometry,
    ) -> anyhow::Result<Arc<dyn ShellWindow>> {
        let window = Arc::new(FakeWindow {
            id: ContentsId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
            index,
            destroyed: AtomicBool::new(false),
            received: Mutex::new(Vec::new()),
            actions: Mutex::new(Vec::new()),
        });
        self.created.lock().unwrap().push(Arc::clone(&window));
        Ok(window)
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    stored: Mutex<HashMap<usize, SessionGeometry>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, index: usize) -> Result<SessionGeometry, ConfigError> {
        Ok(self
            .stored
            .lock()
            .unwrap()
            .get(&index)
            .copied()
            .unwrap_or_default())
    }

    async fn store(&self, index: usize, geometry: &SessionGeometry) -> Result<(), ConfigError> {
        self.stored.lock().unwrap().insert(index, *geometry);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeNativeTheme {
    pub dark: AtomicBool,
}

impl NativeTheme for FakeNativeTheme {
    fn should_use_dark_colors(&self) -> bool {
        self.dark.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct RecordingOpener {
    pub opened: Mutex<Vec<String>>,
}

impl ExternalOpener for RecordingOpener {
    fn open_external(&self, url: &str) -> anyhow::Result<()> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// Package service with scripted updates
#[derive(Default)]
pub struct ScriptedPackages {
    pub available: Vec<ThemeUpdate>,
    /// Items whose update reports an error outcome
    pub failing: Vec<String>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedPackages {
    pub fn with_updates(names: &[&str], failing: &[&str]) -> Self {
        Self {
            available: names
                .iter()
                .map(|name| ThemeUpdate {
                    name: name.to_string(),
                    version: "2.0.0".to_string(),
                })
                .collect(),
            failing: failing.iter().map(|s| s.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PackageService for ScriptedPackages {
    async fn install(&self, name: &str, version: Option<&str>) -> anyhow::Result<InstalledPackage> {
        self.calls.lock().unwrap().push(format!("install {name}"));
        Ok(InstalledPackage {
            name: name.to_string(),
            version: version.unwrap_or("1.0.0").to_string(),
        })
    }

    async fn uninstall(&self, name: &str) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(format!("uninstall {name}"));
        Ok(())
    }

    async fn check_for_updates(&self) -> anyhow::Result<Vec<ThemeUpdate>> {
        self.calls.lock().unwrap().push("check".to_string());
        Ok(self.available.clone())
    }

    async fn update(&self, items: &[ThemeUpdate]) -> anyhow::Result<Vec<UpdateOutcome>> {
        let mut outcomes = Vec::new();
        for item in items {
            self.calls.lock().unwrap().push(format!("update {}", item.name));
            if self.failing.contains(&item.name) {
                outcomes.push(UpdateOutcome::failure(&item.name, "tarball corrupted"));
            } else {
                outcomes.push(UpdateOutcome::success(&item.name));
            }
        }
        Ok(outcomes)
    }
}

/// Everything a test needs to drive an environment and inspect the host side
pub struct Harness {
    pub dirs: DirectoryContext,
    pub factory: Arc<FakeWindowFactory>,
    pub native_theme: Arc<FakeNativeTheme>,
    pub opener: Arc<RecordingOpener>,
    pub packages: Arc<ScriptedPackages>,
}

impl Harness {
    pub fn new(temp: &Path) -> Self {
        Self::with_packages(temp, ScriptedPackages::default())
    }

    pub fn with_packages(temp: &Path, packages: ScriptedPackages) -> Self {
        Self {
            dirs: DirectoryContext::for_testing(temp),
            factory: Arc::default(),
            native_theme: Arc::default(),
            opener: Arc::default(),
            packages: Arc::new(packages),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        let mut collaborators = Collaborators::file_backed(
            &self.dirs,
            Arc::clone(&self.factory) as Arc<dyn WindowFactory>,
            Arc::clone(&self.native_theme) as Arc<dyn NativeTheme>,
            Arc::clone(&self.packages) as Arc<dyn PackageService>,
        );
        collaborators.sessions = Arc::new(MemorySessionStore::default());
        collaborators.opener = Arc::clone(&self.opener) as Arc<dyn ExternalOpener>;
        collaborators
    }

    /// Environment with the background update check disabled
    pub fn environment(&self) -> AppEnvironment {
        self.environment_with(ThemeOptions {
            skip_update_check: true,
            ..Default::default()
        })
    }

    pub fn environment_with(&self, theme_options: ThemeOptions) -> AppEnvironment {
        AppEnvironment::with_theme_options(
            self.dirs.clone(),
            StartupOptions::default(),
            self.collaborators(),
            theme_options,
        )
        .quit_on_all_closed(true)
    }

    /// Write the themes registry and the stylesheets it references
    pub fn install_themes(&self, themes: &[(ThemeDescriptor, &str)]) {
        std::fs::create_dir_all(&self.dirs.themes_dir).unwrap();
        let mut document = ThemesDocument::default();
        for (descriptor, css) in themes {
            let file = self.dirs.themes_dir.join(&descriptor.main_file);
            std::fs::create_dir_all(file.parent().unwrap()).unwrap();
            std::fs::write(&file, css).unwrap();
            document.upsert(descriptor.clone());
        }
        std::fs::write(
            &self.dirs.themes_registry_file,
            serde_json::to_string_pretty(&document).unwrap(),
        )
        .unwrap();
    }

    pub fn registry(&self) -> JsonThemeRegistry {
        JsonThemeRegistry::new(self.dirs.themes_registry_file.clone())
    }
}
