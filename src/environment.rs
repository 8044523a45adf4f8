//! The application context: owns the coordinators and routes every event.
//!
//! `AppEnvironment` is built once at start-up from a `Collaborators` bundle
//! and then driven by its run loop. Requests and notifications from windows,
//! host window events, process lifecycle events and preference changes all
//! arrive there, so coordinator state is only ever touched from one task.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;

use crate::config::{HostSwitch, StartupOptions};
use crate::config_io::{DirectoryContext, JsonPreferencesStore, PreferenceChange, PreferencesStore};
use crate::ipc::{
    Broadcast, Envelope, Inbox, IpcError, LifecycleEvent, Notification, Request, Response,
    UpdateEvent,
};
use crate::protocol::{ModuleSchemeResolver, SchemeRegistry, ThemeSchemeResolver};
use crate::themes::defaults::prepare_environment;
use crate::themes::{
    JsonThemeRegistry, PackageService, ThemeCoordinator, ThemeError, ThemeOptions, ThemeRegistry,
};
use crate::window::session::{JsonSessionStore, SessionStore};
use crate::window::{
    ContentsId, ExternalOpener, NativeTheme, PopupDecision, SystemOpener, WindowCoordinator,
    WindowEvent, WindowFactory,
};

/// External services the shell depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub window_factory: Arc<dyn WindowFactory>,
    pub sessions: Arc<dyn SessionStore>,
    pub preferences: Arc<dyn PreferencesStore>,
    pub registry: Arc<dyn ThemeRegistry>,
    pub packages: Arc<dyn PackageService>,
    pub native_theme: Arc<dyn NativeTheme>,
    pub opener: Arc<dyn ExternalOpener>,
}

impl Collaborators {
    /// File-backed stores under `dirs`, with the given host seams.
    pub fn file_backed(
        dirs: &DirectoryContext,
        window_factory: Arc<dyn WindowFactory>,
        native_theme: Arc<dyn NativeTheme>,
        packages: Arc<dyn PackageService>,
    ) -> Self {
        Self {
            window_factory,
            sessions: Arc::new(JsonSessionStore::new(dirs.sessions_dir())),
            preferences: Arc::new(JsonPreferencesStore::new(dirs.settings_file.clone())),
            registry: Arc::new(JsonThemeRegistry::new(dirs.themes_registry_file.clone())),
            packages,
            native_theme,
            opener: Arc::new(SystemOpener),
        }
    }
}

/// Whether the process should keep running after a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    Continue,
    Quit,
}

pub struct AppEnvironment {
    dirs: DirectoryContext,
    options: StartupOptions,
    windows: WindowCoordinator,
    themes: ThemeCoordinator,
    schemes: SchemeRegistry,
    preferences: Arc<dyn PreferencesStore>,
    native_theme: Arc<dyn NativeTheme>,
    host_switches: Vec<HostSwitch>,
    quit_on_all_closed: bool,
}

impl AppEnvironment {
    /// Build the environment. Must be called inside a tokio runtime.
    pub fn new(
        dirs: DirectoryContext,
        options: StartupOptions,
        collaborators: Collaborators,
    ) -> Self {
        let theme_options = ThemeOptions {
            skip_update_check: options.skip_themes_update,
            ..Default::default()
        };
        Self::with_theme_options(dirs, options, collaborators, theme_options)
    }

    pub fn with_theme_options(
        dirs: DirectoryContext,
        options: StartupOptions,
        collaborators: Collaborators,
        theme_options: ThemeOptions,
    ) -> Self {
        tracing::debug!("Initializing windows manager.");
        let windows = WindowCoordinator::new(
            collaborators.window_factory,
            collaborators.sessions,
            collaborators.opener,
        )
        .with_devtools(options.with_devtools);

        let themes = ThemeCoordinator::new(
            Arc::clone(&collaborators.preferences),
            Arc::clone(&collaborators.registry),
            collaborators.packages,
            theme_options,
        );

        let mut schemes = SchemeRegistry::new();
        schemes.register(Arc::new(ThemeSchemeResolver::new(
            dirs.themes_dir.clone(),
            collaborators.registry,
        )));
        schemes.register(Arc::new(ModuleSchemeResolver::new(dirs.app_root.clone())));

        Self {
            dirs,
            options,
            windows,
            themes,
            schemes,
            preferences: collaborators.preferences,
            native_theme: collaborators.native_theme,
            host_switches: Vec::new(),
            quit_on_all_closed: !cfg!(target_os = "macos"),
        }
    }

    /// Override whether closing the last window ends the process.
    pub fn quit_on_all_closed(mut self, quit: bool) -> Self {
        self.quit_on_all_closed = quit;
        self
    }

    pub fn dirs(&self) -> &DirectoryContext {
        &self.dirs
    }

    pub fn windows(&self) -> &WindowCoordinator {
        &self.windows
    }

    pub fn windows_mut(&mut self) -> &mut WindowCoordinator {
        &mut self.windows
    }

    pub fn themes(&self) -> &ThemeCoordinator {
        &self.themes
    }

    pub fn themes_mut(&mut self) -> &mut ThemeCoordinator {
        &mut self.themes
    }

    pub fn schemes(&self) -> &SchemeRegistry {
        &self.schemes
    }

    /// Switches computed from the settings during `start`.
    pub fn host_switches(&self) -> &[HostSwitch] {
        &self.host_switches
    }

    /// Prepare the environment, read the settings and open the first window.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        if let Err(e) = prepare_environment(&self.dirs).await {
            tracing::error!("Unable to prepare the themes environment: {}", e);
        }

        tracing::debug!("Loading user configuration.");
        let settings = match self.preferences.load().await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::error!("Unable to load settings, using defaults: {}", e);
                Default::default()
            }
        };
        tracing::debug!("User configuration ready.");

        self.host_switches = settings.host_switches();
        for switch in &self.host_switches {
            tracing::info!(
                "Host switch {}={}",
                switch.name,
                switch.value.as_deref().unwrap_or("")
            );
        }

        let route = self.options.open.clone();
        self.windows
            .open(route.as_deref())
            .await
            .context("Failed to open the first window")?;
        Ok(())
    }

    /// Answer a request from the window with content `sender`.
    pub async fn handle_request(
        &mut self,
        sender: ContentsId,
        request: Request,
    ) -> Result<Response, IpcError> {
        tracing::debug!("Request {} from {}", request.kind(), sender);
        let result = match request {
            Request::ListThemes => self.themes.list_themes().await.map(Response::Themes),
            Request::ActiveThemeInfo => self.themes.active_theme_info().await.map(Response::Theme),
            Request::ActivateTheme { id } => self.themes.activate(&id).await.map(|_| Response::Ack),
            Request::InstallTheme { name } => {
                self.themes.install(&name).await.map(Response::Installed)
            }
            Request::UninstallTheme { name } => {
                self.themes.uninstall(&name).await.map(|_| Response::Ack)
            }
            Request::WindowState => {
                let dark = self.native_theme.should_use_dark_colors();
                tracing::debug!("Sending window state info");
                return Ok(Response::WindowState(self.windows.window_state(sender, dark)));
            }
        };
        result.map_err(|e| {
            match &e {
                ThemeError::InvalidArgument(_) => tracing::warn!("{}", e),
                _ => tracing::error!("{}", e),
            }
            IpcError::from(e)
        })
    }

    pub async fn handle_notification(&mut self, sender: ContentsId, notification: Notification) {
        match notification {
            Notification::NewWindow => {
                if let Err(e) = self.windows.open(None).await {
                    tracing::error!("{:#}", e);
                }
            }
            Notification::WindowReloading => self.windows.window_reloading(sender),
            Notification::SettingsChanged { key, value, area } => {
                self.windows.settings_changed(sender, key, value, area)
            }
            Notification::ToggleDevTools => self.windows.toggle_dev_tools(sender),
        }
    }

    pub async fn handle_window_event(&mut self, id: ContentsId, event: WindowEvent) {
        self.windows.handle_window_event(id, event).await;
    }

    pub fn popup_requested(&self, url: &str, frame_name: &str) -> PopupDecision {
        self.windows.popup_requested(url, frame_name)
    }

    pub async fn handle_lifecycle(&mut self, event: LifecycleEvent) -> LifecycleOutcome {
        match event {
            LifecycleEvent::AllWindowsClosed => {
                if self.quit_on_all_closed {
                    tracing::info!("All windows closed, quitting");
                    return LifecycleOutcome::Quit;
                }
            }
            LifecycleEvent::Activate => {
                if let Err(e) = self.windows.restore_last().await {
                    tracing::error!("{:#}", e);
                }
            }
            LifecycleEvent::NativeThemeUpdated { dark } => {
                self.windows
                    .notify_all(&Broadcast::SystemThemeChanged { is_dark: dark });
            }
            LifecycleEvent::Update(event) => self.relay_update_event(event),
        }
        LifecycleOutcome::Continue
    }

    /// Forward an auto-update event to every window.
    pub fn relay_update_event(&mut self, event: UpdateEvent) {
        self.windows.notify_all(&Broadcast::Update { event });
    }

    pub fn preference_changed(&mut self, change: PreferenceChange) {
        self.windows.notify_all(&Broadcast::AppPreferenceUpdated {
            name: change.name,
            value: change.value,
        });
    }

    async fn dispatch(&mut self, envelope: Envelope) -> LifecycleOutcome {
        match envelope {
            Envelope::Request {
                sender,
                request,
                reply,
            } => {
                let response = self.handle_request(sender, request).await;
                // The requesting window may be gone
                let _ = reply.send(response);
            }
            Envelope::Notification {
                sender,
                notification,
            } => self.handle_notification(sender, notification).await,
            Envelope::Window { id, event } => self.handle_window_event(id, event).await,
            Envelope::Popup {
                sender,
                url,
                frame_name,
                reply,
            } => {
                tracing::debug!("Popup {} requested by {}", url, sender);
                let _ = reply.send(self.popup_requested(&url, &frame_name));
            }
            Envelope::Lifecycle(event) => return self.handle_lifecycle(event).await,
        }
        LifecycleOutcome::Continue
    }

    /// Process events until the bus closes or a lifecycle event asks to quit.
    pub async fn run(&mut self, mut inbox: Inbox) -> LifecycleOutcome {
        let mut changes = self.preferences.subscribe();
        let mut preferences_open = true;

        loop {
            tokio::select! {
                envelope = inbox.recv() => {
                    let Some(envelope) = envelope else {
                        tracing::debug!("IPC bus closed");
                        return LifecycleOutcome::Continue;
                    };
                    if self.dispatch(envelope).await == LifecycleOutcome::Quit {
                        return LifecycleOutcome::Quit;
                    }
                }
                change = changes.recv(), if preferences_open => match change {
                    Ok(change) => self.preference_changed(change),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Missed {} preference change notifications", skipped);
                    }
                    Err(RecvError::Closed) => preferences_open = false,
                },
            }
        }
    }
}
