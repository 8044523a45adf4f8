//! Host window seams and window coordination.
//!
//! The rendering surface is owned by the host. The shell sees each window
//! through `ShellWindow` and creates them through `WindowFactory`, so the
//! coordinator can be driven by any host (or by mocks in tests).

pub mod coordinator;
pub mod headless;
pub mod session;

use std::fmt;
use std::sync::Arc;

use crate::ipc::Broadcast;
use session::SessionGeometry;

pub use coordinator::{PopupDecision, WindowCoordinator, WindowEvent, WindowHandle};

/// Identity of a window's content-delivery channel.
///
/// Two handles refer to the same window only if their ids are equal; the
/// logical window index is never used for identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentsId(pub u64);

impl fmt::Display for ContentsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contents#{}", self.0)
    }
}

/// A live top-level window provided by the host.
///
/// Every method must be safe to call after the window is destroyed; calls on
/// a destroyed window are no-ops.
pub trait ShellWindow: Send + Sync {
    fn contents_id(&self) -> ContentsId;

    fn is_destroyed(&self) -> bool;

    /// Deliver a broadcast message to the window's content
    fn send(&self, message: &Broadcast);

    fn show(&self);

    /// Load the shell page. The route is read back by the page through the
    /// window-state request, not passed here.
    fn load_shell_page(&self);

    fn reload(&self);

    fn toggle_dev_tools(&self);

    fn open_dev_tools(&self);
}

/// Creates host windows.
pub trait WindowFactory: Send + Sync {
    /// Create a hidden window for `index` at the given geometry.
    fn create(&self, index: usize, geometry: &SessionGeometry)
        -> anyhow::Result<Arc<dyn ShellWindow>>;
}

/// Operating system appearance.
pub trait NativeTheme: Send + Sync {
    fn should_use_dark_colors(&self) -> bool;
}

/// Opens URLs with the operating system's default handler.
pub trait ExternalOpener: Send + Sync {
    fn open_external(&self, url: &str) -> anyhow::Result<()>;
}

/// Opens URLs through the desktop's default handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl ExternalOpener for SystemOpener {
    fn open_external(&self, url: &str) -> anyhow::Result<()> {
        open::that(url)?;
        Ok(())
    }
}

/// Native theme for hosts that do not report an appearance.
#[derive(Debug, Default, Clone, Copy)]
pub struct LightNativeTheme;

impl NativeTheme for LightNativeTheme {
    fn should_use_dark_colors(&self) -> bool {
        false
    }
}
