//! Windows without a rendering surface.
//!
//! Headless windows write every broadcast they receive as one JSON line to a
//! shared sink. The binary uses them to drive the shell over stdin/stdout.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;

use super::session::SessionGeometry;
use super::{ContentsId, ShellWindow, WindowFactory};
use crate::ipc::Broadcast;

/// Shared output for every headless window.
pub type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

pub struct HeadlessWindow {
    id: ContentsId,
    index: usize,
    destroyed: AtomicBool,
    sink: Sink,
}

impl HeadlessWindow {
    fn emit(&self, value: serde_json::Value) {
        if let Ok(mut sink) = self.sink.lock() {
            let _ = writeln!(sink, "{value}");
            let _ = sink.flush();
        }
    }

    fn action(&self, action: &str) {
        tracing::debug!("Window {} ({}): {}", self.index, self.id, action);
        self.emit(json!({"kind": "window", "window": self.id.0, "action": action}));
    }
}

impl ShellWindow for HeadlessWindow {
    fn contents_id(&self) -> ContentsId {
        self.id
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn send(&self, message: &Broadcast) {
        self.emit(json!({"kind": "broadcast", "window": self.id.0, "message": message}));
    }

    fn show(&self) {
        self.action("show");
    }

    fn load_shell_page(&self) {
        self.action("load");
    }

    fn reload(&self) {
        self.action("reload");
    }

    fn toggle_dev_tools(&self) {
        self.action("toggle-devtools");
    }

    fn open_dev_tools(&self) {
        self.action("open-devtools");
    }
}

pub struct HeadlessWindowFactory {
    next_id: AtomicU64,
    sink: Sink,
}

impl HeadlessWindowFactory {
    pub fn new(sink: Sink) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            sink,
        }
    }
}

impl WindowFactory for HeadlessWindowFactory {
    fn create(
        &self,
        index: usize,
        geometry: &SessionGeometry,
    ) -> anyhow::Result<Arc<dyn ShellWindow>> {
        let id = ContentsId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let window = HeadlessWindow {
            id,
            index,
            destroyed: AtomicBool::new(false),
            sink: Arc::clone(&self.sink),
        };
        window.emit(json!({
            "kind": "window",
            "window": id.0,
            "action": "create",
            "index": index,
            "geometry": geometry,
        }));
        Ok(Arc::new(window))
    }
}
