//! Window set ownership, index assignment and broadcasting.
//!
//! The coordinator owns every live window handle. Indices are stable for the
//! lifetime of a window and reused after it closes: a new window always gets
//! the lowest index not held by a live window, so per-index session geometry
//! is reused instead of growing without bound.
//!
//! Destroyed windows may linger in the list until an iteration discovers
//! them. Every path that walks the list treats them as absent, and the
//! broadcast paths prune them in the same pass.

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::session::{SessionGeometry, SessionStore};
use super::{ContentsId, ExternalOpener, ShellWindow, WindowFactory};
use crate::ipc::{Broadcast, WindowStateInfo};

/// Frame name that marks a popup as an auxiliary context.
pub const AUXILIARY_FRAME_NAME: &str = "modal";

/// One open top-level window.
pub struct WindowHandle {
    index: usize,
    window: Arc<dyn ShellWindow>,
    /// Route the page should start at; cleared on reload
    start_path: Option<String>,
    geometry: SessionGeometry,
}

impl WindowHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn window(&self) -> &Arc<dyn ShellWindow> {
        &self.window
    }

    pub fn contents_id(&self) -> ContentsId {
        self.window.contents_id()
    }

    pub fn start_path(&self) -> Option<&str> {
        self.start_path.as_deref()
    }

    pub fn geometry(&self) -> &SessionGeometry {
        &self.geometry
    }

    pub fn is_destroyed(&self) -> bool {
        self.window.is_destroyed()
    }
}

impl std::fmt::Debug for WindowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowHandle")
            .field("index", &self.index)
            .field("contents_id", &self.window.contents_id())
            .field("start_path", &self.start_path)
            .field("geometry", &self.geometry)
            .finish()
    }
}

/// Lifecycle events reported by the host for one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WindowEvent {
    Closed,
    Focused,
    ReadyToShow,
    Moved { x: i32, y: i32 },
    Resized { width: u32, height: u32 },
}

/// What happened to a popup request from window content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PopupDecision {
    /// The request was dropped
    Denied,
    /// The request was dropped and the URL handed to the OS opener
    OpenedExternally,
}

pub struct WindowCoordinator {
    windows: Vec<WindowHandle>,
    last_focused: Option<Arc<dyn ShellWindow>>,
    factory: Arc<dyn WindowFactory>,
    sessions: Arc<dyn SessionStore>,
    opener: Arc<dyn ExternalOpener>,
    with_devtools: bool,
}

impl WindowCoordinator {
    pub fn new(
        factory: Arc<dyn WindowFactory>,
        sessions: Arc<dyn SessionStore>,
        opener: Arc<dyn ExternalOpener>,
    ) -> Self {
        Self {
            windows: Vec::new(),
            last_focused: None,
            factory,
            sessions,
            opener,
            with_devtools: false,
        }
    }

    /// Open developer tools in every window opened from now on.
    pub fn with_devtools(mut self, enabled: bool) -> Self {
        self.with_devtools = enabled;
        self
    }

    /// Handles in creation order, including destroyed ones not yet pruned.
    pub fn windows(&self) -> &[WindowHandle] {
        &self.windows
    }

    pub fn has_window(&self) -> bool {
        !self.windows.is_empty()
    }

    /// Live handle whose content channel is `id`.
    pub fn find(&self, id: ContentsId) -> Option<&WindowHandle> {
        self.windows
            .iter()
            .find(|h| !h.is_destroyed() && h.contents_id() == id)
    }

    fn find_mut(&mut self, id: ContentsId) -> Option<&mut WindowHandle> {
        self.windows
            .iter_mut()
            .find(|h| !h.is_destroyed() && h.contents_id() == id)
    }

    /// Lowest index not held by a live window.
    pub fn index_for(&self) -> usize {
        let mut used: Vec<usize> = self
            .windows
            .iter()
            .filter(|h| !h.is_destroyed())
            .map(|h| h.index)
            .collect();
        used.sort_unstable();
        used.iter()
            .enumerate()
            .find(|(position, index)| position != *index)
            .map(|(position, _)| position)
            .unwrap_or(used.len())
    }

    /// Open a new window starting at `path`.
    ///
    /// Returns once the window exists and its page load has been started.
    pub async fn open(&mut self, path: Option<&str>) -> anyhow::Result<&WindowHandle> {
        match path {
            Some(path) => tracing::debug!("Opening new window: {}", path),
            None => tracing::debug!("Opening new window"),
        }
        self.prune_destroyed();

        let index = self.index_for();
        tracing::debug!("Generated index for the window: {}", index);

        let geometry = match self.sessions.load(index).await {
            Ok(geometry) => geometry,
            Err(e) => {
                tracing::warn!("Unable to restore session for window {}: {}", index, e);
                SessionGeometry::default()
            }
        };

        let window = self
            .factory
            .create(index, &geometry)
            .with_context(|| format!("Failed to create window {index}"))?;
        self.windows.push(WindowHandle {
            index,
            window: Arc::clone(&window),
            start_path: path.map(str::to_string),
            geometry,
        });

        window.load_shell_page();
        if self.with_devtools {
            window.open_dev_tools();
        }

        let position = self.windows.len() - 1;
        Ok(&self.windows[position])
    }

    /// Show the newest live window, or open one when none is left.
    pub async fn restore_last(&mut self) -> anyhow::Result<()> {
        match self.last_active() {
            Some(window) => {
                window.show();
                Ok(())
            }
            None => self.open(None).await.map(|_| ()),
        }
    }

    /// Most recently focused window, unless it has been destroyed since.
    pub fn last_focused(&mut self) -> Option<Arc<dyn ShellWindow>> {
        if self
            .last_focused
            .as_ref()
            .is_some_and(|window| window.is_destroyed())
        {
            self.last_focused = None;
        }
        self.last_focused.clone()
    }

    /// Most recently created window that is not destroyed.
    pub fn last_active(&self) -> Option<Arc<dyn ShellWindow>> {
        self.windows
            .iter()
            .rev()
            .find(|h| !h.is_destroyed())
            .map(|h| Arc::clone(&h.window))
    }

    /// Send `message` to every live window, pruning destroyed ones.
    pub fn notify_all(&mut self, message: &Broadcast) {
        tracing::debug!("Notifying all windows with type: {}", message.kind());
        self.windows.retain(|handle| {
            if handle.is_destroyed() {
                tracing::debug!("Pruning destroyed window {}", handle.index);
                return false;
            }
            handle.window.send(message);
            true
        });
    }

    /// Send `message` to every live window except the one with content `excluded`.
    pub fn notify_all_but(&mut self, message: &Broadcast, excluded: ContentsId) {
        tracing::debug!(
            "Notifying all windows but {} with type: {}",
            excluded,
            message.kind()
        );
        self.windows.retain(|handle| {
            if handle.is_destroyed() {
                tracing::debug!("Pruning destroyed window {}", handle.index);
                return false;
            }
            if handle.contents_id() != excluded {
                handle.window.send(message);
            }
            true
        });
    }

    /// Reload every live window, pruning destroyed ones.
    pub fn reload_windows(&mut self) {
        tracing::debug!("Reloading all windows.");
        self.windows.retain(|handle| {
            if handle.is_destroyed() {
                return false;
            }
            handle.window.reload();
            true
        });
    }

    /// Apply a host event for the window with content `id`.
    pub async fn handle_window_event(&mut self, id: ContentsId, event: WindowEvent) {
        match event {
            WindowEvent::Closed => self.window_closed(id),
            WindowEvent::Focused => {
                if let Some(handle) = self.find(id) {
                    self.last_focused = Some(Arc::clone(&handle.window));
                }
            }
            WindowEvent::ReadyToShow => {
                tracing::debug!("Window is ready to show");
                if let Some(handle) = self.find(id) {
                    handle.window.show();
                }
            }
            WindowEvent::Moved { x, y } => {
                self.update_geometry(id, |geometry| {
                    geometry.position.x = Some(x);
                    geometry.position.y = Some(y);
                })
                .await
            }
            WindowEvent::Resized { width, height } => {
                self.update_geometry(id, |geometry| {
                    geometry.size.width = width;
                    geometry.size.height = height;
                })
                .await
            }
        }
    }

    fn window_closed(&mut self, id: ContentsId) {
        if self
            .last_focused
            .as_ref()
            .is_some_and(|window| window.contents_id() == id)
        {
            self.last_focused = None;
        }
        if let Some(position) = self.windows.iter().position(|h| h.contents_id() == id) {
            let handle = self.windows.remove(position);
            tracing::debug!("Window {} closed", handle.index);
        }
    }

    async fn update_geometry(&mut self, id: ContentsId, apply: impl FnOnce(&mut SessionGeometry)) {
        let Some(handle) = self.find_mut(id) else {
            return;
        };
        apply(&mut handle.geometry);
        let (index, geometry) = (handle.index, handle.geometry);
        if let Err(e) = self.sessions.store(index, &geometry).await {
            tracing::warn!("Unable to store session for window {}: {}", index, e);
        }
    }

    /// Decide what to do with a popup opened by window content.
    ///
    /// Popups never create in-process windows. Requests tagged for the
    /// auxiliary frame are handed to the OS default handler.
    pub fn popup_requested(&self, url: &str, frame_name: &str) -> PopupDecision {
        if frame_name != AUXILIARY_FRAME_NAME {
            tracing::debug!("Denied popup {}", url);
            return PopupDecision::Denied;
        }
        match self.opener.open_external(url) {
            Ok(()) => PopupDecision::OpenedExternally,
            Err(e) => {
                tracing::error!("Unable to open {} externally: {:#}", url, e);
                PopupDecision::Denied
            }
        }
    }

    /// The window with content `id` is about to reload.
    pub fn window_reloading(&mut self, id: ContentsId) {
        tracing::debug!("Window is reloading");
        if let Some(handle) = self.find_mut(id) {
            handle.start_path = None;
        }
    }

    /// Start-up state for the window with content `id`.
    pub fn window_state(&self, id: ContentsId, dark_mode: bool) -> WindowStateInfo {
        let handle = self.find(id);
        WindowStateInfo {
            dark_mode,
            index: handle.map(|h| h.index),
            start_path: handle.and_then(|h| h.start_path.clone()),
        }
    }

    /// Relay a settings change from one window to all the others.
    pub fn settings_changed(
        &mut self,
        sender: ContentsId,
        key: String,
        value: serde_json::Value,
        area: Option<String>,
    ) {
        self.notify_all_but(&Broadcast::SettingsChanged { key, value, area }, sender);
    }

    pub fn toggle_dev_tools(&self, id: ContentsId) {
        if let Some(handle) = self.find(id) {
            handle.window.toggle_dev_tools();
        }
    }

    fn prune_destroyed(&mut self) {
        self.windows.retain(|h| !h.is_destroyed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockWindow {
        id: u64,
        destroyed: AtomicBool,
        log: Mutex<Vec<String>>,
    }

    impl MockWindow {
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn record(&self, entry: impl Into<String>) {
            self.log.lock().unwrap().push(entry.into());
        }
    }

    impl ShellWindow for MockWindow {
        fn contents_id(&self) -> ContentsId {
            ContentsId(self.id)
        }
        fn is_destroyed(&self) -> bool {
            self.destroyed.load(Ordering::SeqCst)
        }
        fn send(&self, message: &Broadcast) {
            self.record(format!("send {}", message.kind()));
        }
        fn show(&self) {
            self.record("show");
        }
        fn load_shell_page(&self) {
            self.record("load");
        }
        fn reload(&self) {
            self.record("reload");
        }
        fn toggle_dev_tools(&self) {
            self.record("toggle-devtools");
        }
        fn open_dev_tools(&self) {
            self.record("devtools");
        }
    }

    #[derive(Default)]
    struct MockFactory {
        next_id: AtomicU64,
        created: Mutex<Vec<(usize, Arc<MockWindow>)>>,
    }

    impl MockFactory {
        fn window(&self, position: usize) -> Arc<MockWindow> {
            Arc::clone(&self.created.lock().unwrap()[position].1)
        }
    }

    impl WindowFactory for MockFactory {
        fn create(
            &self,
            index: usize,
            _geometry: &SessionGeometry,
        ) -> anyhow::Result<Arc<dyn ShellWindow>> {
            let window = Arc::new(MockWindow {
                id: self.next_id.fetch_add(1, Ordering::SeqCst) + 100,
                ..Default::default()
            });
            self.created
                .lock()
                .unwrap()
                .push((index, Arc::clone(&window)));
            Ok(window)
        }
    }

    #[derive(Default)]
    struct MemorySessions {
        stored: Mutex<HashMap<usize, SessionGeometry>>,
    }

    #[async_trait]
    impl SessionStore for MemorySessions {
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
    struct RecordingOpener {
        opened: Mutex<Vec<String>>,
    }

    impl ExternalOpener for RecordingOpener {
        fn open_external(&self, url: &str) -> anyhow::Result<()> {
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    struct Fixture {
        coordinator: WindowCoordinator,
        factory: Arc<MockFactory>,
        sessions: Arc<MemorySessions>,
        opener: Arc<RecordingOpener>,
    }

    fn fixture() -> Fixture {
        let factory = Arc::new(MockFactory::default());
        let sessions = Arc::new(MemorySessions::default());
        let opener = Arc::new(RecordingOpener::default());
        let coordinator = WindowCoordinator::new(
            Arc::clone(&factory) as Arc<dyn WindowFactory>,
            Arc::clone(&sessions) as Arc<dyn SessionStore>,
            Arc::clone(&opener) as Arc<dyn ExternalOpener>,
        );
        Fixture {
            coordinator,
            factory,
            sessions,
            opener,
        }
    }

    fn live_indices(coordinator: &WindowCoordinator) -> Vec<usize> {
        let mut indices: Vec<usize> = coordinator
            .windows()
            .iter()
            .filter(|h| !h.is_destroyed())
            .map(|h| h.index())
            .collect();
        indices.sort_unstable();
        indices
    }

    fn ping() -> Broadcast {
        Broadcast::SystemThemeChanged { is_dark: true }
    }

    #[tokio::test]
    async fn test_indices_assigned_from_zero() {
        let mut f = fixture();
        for expected in 0..3 {
            let handle = f.coordinator.open(None).await.unwrap();
            assert_eq!(handle.index(), expected);
        }
        assert_eq!(live_indices(&f.coordinator), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_reuses_lowest_free_index() {
        let mut f = fixture();
        for _ in 0..3 {
            f.coordinator.open(None).await.unwrap();
        }
        let second = f.factory.window(1);
        f.coordinator
            .handle_window_event(second.contents_id(), WindowEvent::Closed)
            .await;
        assert_eq!(f.coordinator.index_for(), 1);
        assert_eq!(f.coordinator.open(None).await.unwrap().index(), 1);
        assert_eq!(live_indices(&f.coordinator), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_destroyed_window_frees_its_index() {
        let mut f = fixture();
        f.coordinator.open(None).await.unwrap();
        f.coordinator.open(None).await.unwrap();
        f.factory.window(0).destroyed.store(true, Ordering::SeqCst);

        assert_eq!(f.coordinator.index_for(), 0);
        assert_eq!(f.coordinator.open(None).await.unwrap().index(), 0);
        assert_eq!(f.coordinator.windows().len(), 2);
    }

    #[tokio::test]
    async fn test_open_loads_page_and_devtools() {
        let mut f = fixture();
        f.coordinator = f.coordinator.with_devtools(true);
        let handle = f.coordinator.open(Some("/request")).await.unwrap();
        assert_eq!(handle.start_path(), Some("/request"));
        assert_eq!(f.factory.window(0).log(), vec!["load", "devtools"]);
    }

    #[tokio::test]
    async fn test_open_uses_stored_geometry() {
        let mut f = fixture();
        let stored = SessionGeometry::at(1, 2, 300, 400);
        f.sessions.store(0, &stored).await.unwrap();
        let handle = f.coordinator.open(None).await.unwrap();
        assert_eq!(*handle.geometry(), stored);
    }

    #[tokio::test]
    async fn test_notify_all_prunes_destroyed() {
        let mut f = fixture();
        for _ in 0..3 {
            f.coordinator.open(None).await.unwrap();
        }
        let dead = f.factory.window(1);
        dead.destroyed.store(true, Ordering::SeqCst);

        f.coordinator.notify_all(&ping());
        f.coordinator.notify_all(&ping());
        f.coordinator.notify_all_but(&ping(), f.factory.window(0).contents_id());

        assert_eq!(f.coordinator.windows().len(), 2);
        assert!(!dead.log().iter().any(|e| e.starts_with("send")));
        let sends = |w: &MockWindow| w.log().iter().filter(|e| e.starts_with("send")).count();
        assert_eq!(sends(&*f.factory.window(0)), 2);
        assert_eq!(sends(&*f.factory.window(2)), 3);
    }

    #[tokio::test]
    async fn test_notify_all_but_skips_by_contents_identity() {
        let mut f = fixture();
        f.coordinator.open(None).await.unwrap();
        f.coordinator.open(None).await.unwrap();
        let sender = f.factory.window(1);

        f.coordinator.settings_changed(
            sender.contents_id(),
            "theme".to_string(),
            serde_json::json!("dark"),
            Some("local".to_string()),
        );

        assert_eq!(f.factory.window(0).log().last().unwrap(), "send settings-changed");
        assert!(!sender.log().iter().any(|e| e.starts_with("send")));
    }

    #[tokio::test]
    async fn test_last_focused_and_last_active_differ() {
        let mut f = fixture();
        for _ in 0..3 {
            f.coordinator.open(None).await.unwrap();
        }
        let first = f.factory.window(0);
        f.coordinator
            .handle_window_event(first.contents_id(), WindowEvent::Focused)
            .await;

        let focused = f.coordinator.last_focused().unwrap();
        assert_eq!(focused.contents_id(), first.contents_id());
        let active = f.coordinator.last_active().unwrap();
        assert_eq!(active.contents_id(), f.factory.window(2).contents_id());

        first.destroyed.store(true, Ordering::SeqCst);
        assert!(f.coordinator.last_focused().is_none());

        f.factory.window(2).destroyed.store(true, Ordering::SeqCst);
        let active = f.coordinator.last_active().unwrap();
        assert_eq!(active.contents_id(), f.factory.window(1).contents_id());
    }

    #[tokio::test]
    async fn test_close_clears_focus() {
        let mut f = fixture();
        f.coordinator.open(None).await.unwrap();
        let id = f.factory.window(0).contents_id();
        f.coordinator.handle_window_event(id, WindowEvent::Focused).await;
        f.coordinator.handle_window_event(id, WindowEvent::Closed).await;

        assert!(f.coordinator.last_focused().is_none());
        assert!(!f.coordinator.has_window());
    }

    #[tokio::test]
    async fn test_restore_last_shows_or_opens() {
        let mut f = fixture();
        f.coordinator.restore_last().await.unwrap();
        assert_eq!(f.coordinator.windows().len(), 1);

        f.coordinator.restore_last().await.unwrap();
        assert_eq!(f.coordinator.windows().len(), 1);
        assert_eq!(f.factory.window(0).log().last().unwrap(), "show");
    }

    #[tokio::test]
    async fn test_ready_to_show_and_geometry_events() {
        let mut f = fixture();
        f.coordinator.open(None).await.unwrap();
        let id = f.factory.window(0).contents_id();

        f.coordinator.handle_window_event(id, WindowEvent::ReadyToShow).await;
        f.coordinator
            .handle_window_event(id, WindowEvent::Moved { x: 15, y: 25 })
            .await;
        f.coordinator
            .handle_window_event(
                id,
                WindowEvent::Resized {
                    width: 900,
                    height: 700,
                },
            )
            .await;

        assert_eq!(f.factory.window(0).log().last().unwrap(), "show");
        let stored = f.sessions.load(0).await.unwrap();
        assert_eq!(stored, SessionGeometry::at(15, 25, 900, 700));
    }

    #[tokio::test]
    async fn test_reload_clears_start_path_and_window_state() {
        let mut f = fixture();
        f.coordinator.open(Some("/history")).await.unwrap();
        let id = f.factory.window(0).contents_id();

        let state = f.coordinator.window_state(id, true);
        assert_eq!(
            state,
            WindowStateInfo {
                dark_mode: true,
                index: Some(0),
                start_path: Some("/history".to_string()),
            }
        );

        f.coordinator.window_reloading(id);
        assert_eq!(f.coordinator.window_state(id, false).start_path, None);

        let unknown = f.coordinator.window_state(ContentsId(999), false);
        assert_eq!(unknown.index, None);
    }

    #[tokio::test]
    async fn test_reload_windows_prunes() {
        let mut f = fixture();
        f.coordinator.open(None).await.unwrap();
        f.coordinator.open(None).await.unwrap();
        f.factory.window(0).destroyed.store(true, Ordering::SeqCst);

        f.coordinator.reload_windows();

        assert_eq!(f.coordinator.windows().len(), 1);
        assert_eq!(f.factory.window(1).log().last().unwrap(), "reload");
    }

    #[tokio::test]
    async fn test_popup_policy() {
        let f = fixture();
        assert_eq!(
            f.coordinator.popup_requested("https://example.com", ""),
            PopupDecision::Denied
        );
        assert_eq!(
            f.coordinator
                .popup_requested("https://example.com/docs", AUXILIARY_FRAME_NAME),
            PopupDecision::OpenedExternally
        );
        assert_eq!(
            *f.opener.opened.lock().unwrap(),
            vec!["https://example.com/docs".to_string()]
        );
    }

    #[tokio::test]
    async fn test_toggle_dev_tools_targets_sender() {
        let mut f = fixture();
        f.coordinator.open(None).await.unwrap();
        f.coordinator.open(None).await.unwrap();
        f.coordinator
            .toggle_dev_tools(f.factory.window(1).contents_id());
        assert_eq!(f.factory.window(1).log().last().unwrap(), "toggle-devtools");
        assert_eq!(f.factory.window(0).log(), vec!["load"]);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum WindowOp {
            Open,
            /// Close the n-th live window through a close event
            Close(usize),
            /// Destroy the n-th live window without telling the coordinator
            Destroy(usize),
        }

        fn arb_window_op() -> impl Strategy<Value = WindowOp> {
            prop_oneof![
                3 => Just(WindowOp::Open),
                1 => (0..8usize).prop_map(WindowOp::Close),
                1 => (0..8usize).prop_map(WindowOp::Destroy),
            ]
        }

        fn live_indices(coordinator: &WindowCoordinator) -> Vec<usize> {
            coordinator
                .windows()
                .iter()
                .filter(|h| !h.is_destroyed())
                .map(|h| h.index())
                .collect()
        }

        fn lowest_free(live: &[usize]) -> usize {
            (0..).find(|i| !live.contains(i)).unwrap_or_default()
        }

        /// Per step: live indices after the step, and for opens the
        /// expected and assigned index.
        type Step = (Vec<usize>, Option<(usize, usize)>);

        fn run_ops(ops: Vec<WindowOp>) -> Vec<Step> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let mut f = fixture();
                let mut steps = Vec::new();
                for op in ops {
                    let before = live_indices(&f.coordinator);
                    let mut opened = None;
                    match op {
                        WindowOp::Open => {
                            let expected = lowest_free(&before);
                            let assigned = f.coordinator.open(None).await.unwrap().index();
                            opened = Some((expected, assigned));
                        }
                        WindowOp::Close(_) | WindowOp::Destroy(_) if before.is_empty() => {}
                        WindowOp::Close(n) => {
                            let live: Vec<ContentsId> = f
                                .coordinator
                                .windows()
                                .iter()
                                .filter(|h| !h.is_destroyed())
                                .map(|h| h.contents_id())
                                .collect();
                            let id = live[n % live.len()];
                            mark_destroyed(&f.factory, id);
                            f.coordinator
                                .handle_window_event(id, WindowEvent::Closed)
                                .await;
                        }
                        WindowOp::Destroy(n) => {
                            let live: Vec<ContentsId> = f
                                .coordinator
                                .windows()
                                .iter()
                                .filter(|h| !h.is_destroyed())
                                .map(|h| h.contents_id())
                                .collect();
                            mark_destroyed(&f.factory, live[n % live.len()]);
                        }
                    }
                    steps.push((live_indices(&f.coordinator), opened));
                }
                steps
            })
        }

        fn mark_destroyed(factory: &MockFactory, id: ContentsId) {
            let created = factory.created.lock().unwrap();
            if let Some((_, window)) = created.iter().find(|(_, w)| w.contents_id() == id) {
                window.destroyed.store(true, Ordering::SeqCst);
            }
        }

        proptest! {
            /// Live indices stay unique and every open takes the lowest free index
            #[test]
            fn prop_index_allocation(ops in prop::collection::vec(arb_window_op(), 1..40)) {
                for (live, opened) in run_ops(ops) {
                    let mut unique = live.clone();
                    unique.sort_unstable();
                    unique.dedup();
                    prop_assert_eq!(unique.len(), live.len(), "duplicate live index in {:?}", live);

                    if let Some((expected, assigned)) = opened {
                        prop_assert_eq!(assigned, expected);
                    }
                }
            }
        }
    }
}
