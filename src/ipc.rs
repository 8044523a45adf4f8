//! Typed messages exchanged between windows and the shell.
//!
//! Windows talk to the shell with requests (answered through a oneshot reply)
//! and fire-and-forget notifications. The shell talks to windows with
//! broadcasts. Host lifecycle and per-window events travel on the same bus so
//! every mutation of shell state happens in one place, the environment's run
//! loop.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::themes::packages::InstalledPackage;
use crate::themes::types::{ThemeDescriptor, ThemeError};
use crate::window::{ContentsId, PopupDecision, WindowEvent};

/// Request from a window that expects a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    ListThemes,
    ActiveThemeInfo,
    ActivateTheme { id: String },
    /// `name` may carry a `#version` suffix
    InstallTheme { name: String },
    UninstallTheme { name: String },
    #[serde(rename = "window-state-request")]
    WindowState,
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::ListThemes => "list-themes",
            Request::ActiveThemeInfo => "active-theme-info",
            Request::ActivateTheme { .. } => "activate-theme",
            Request::InstallTheme { .. } => "install-theme",
            Request::UninstallTheme { .. } => "uninstall-theme",
            Request::WindowState => "window-state-request",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum Response {
    Themes(Vec<ThemeDescriptor>),
    Theme(ThemeDescriptor),
    Ack,
    Installed(InstalledPackage),
    WindowState(WindowStateInfo),
}

/// Start-up state handed to a window's page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowStateInfo {
    pub dark_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_path: Option<String>,
}

/// Fire-and-forget message from a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    NewWindow,
    WindowReloading,
    SettingsChanged {
        key: String,
        value: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        area: Option<String>,
    },
    #[serde(rename = "toggle-devtools")]
    ToggleDevTools,
}

/// Message pushed from the shell to windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Broadcast {
    SystemThemeChanged {
        #[serde(rename = "isDark")]
        is_dark: bool,
    },
    AppPreferenceUpdated {
        name: String,
        value: serde_json::Value,
    },
    SettingsChanged {
        key: String,
        value: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        area: Option<String>,
    },
    Update {
        event: UpdateEvent,
    },
}

impl Broadcast {
    /// Channel name the message is delivered on.
    pub fn kind(&self) -> &'static str {
        match self {
            Broadcast::SystemThemeChanged { .. } => "system-theme-changed",
            Broadcast::AppPreferenceUpdated { .. } => "app-preference-updated",
            Broadcast::SettingsChanged { .. } => "settings-changed",
            Broadcast::Update { event } => event.kind(),
        }
    }
}

/// Application auto-update lifecycle, relayed to every window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum UpdateEvent {
    CheckingForUpdate,
    UpdateAvailable {
        #[serde(default)]
        info: serde_json::Value,
    },
    UpdateNotAvailable {
        #[serde(default)]
        info: serde_json::Value,
    },
    AutoupdateError {
        message: String,
    },
    DownloadProgress {
        percent: f64,
        #[serde(rename = "bytesPerSecond")]
        bytes_per_second: u64,
        transferred: u64,
        total: u64,
    },
    UpdateDownloaded {
        #[serde(default)]
        info: serde_json::Value,
    },
}

impl UpdateEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            UpdateEvent::CheckingForUpdate => "checking-for-update",
            UpdateEvent::UpdateAvailable { .. } => "update-available",
            UpdateEvent::UpdateNotAvailable { .. } => "update-not-available",
            UpdateEvent::AutoupdateError { .. } => "autoupdate-error",
            UpdateEvent::DownloadProgress { .. } => "download-progress",
            UpdateEvent::UpdateDownloaded { .. } => "update-downloaded",
        }
    }
}

/// Process-level events from the host.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    AllWindowsClosed,
    Activate,
    NativeThemeUpdated { dark: bool },
    Update(UpdateEvent),
}

/// Error returned to a window for a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "kebab-case")]
pub enum IpcError {
    NotFound(String),
    InvalidArgument(String),
    Read(String),
    Store(String),
    Package(String),
    /// The shell could not carry out the request
    Internal(String),
    /// The shell's inbox or the reply channel went away
    ChannelClosed,
}

impl std::fmt::Display for IpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpcError::NotFound(msg) => write!(f, "Not found: {msg}"),
            IpcError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            IpcError::Read(msg) => write!(f, "Read error: {msg}"),
            IpcError::Store(msg) => write!(f, "Store error: {msg}"),
            IpcError::Package(msg) => write!(f, "Package error: {msg}"),
            IpcError::Internal(msg) => write!(f, "Internal error: {msg}"),
            IpcError::ChannelClosed => write!(f, "Channel closed"),
        }
    }
}

impl std::error::Error for IpcError {}

impl From<ThemeError> for IpcError {
    fn from(err: ThemeError) -> Self {
        match err {
            ThemeError::NotFound(msg) => IpcError::NotFound(msg),
            ThemeError::InvalidArgument(msg) => IpcError::InvalidArgument(msg),
            ThemeError::Read(msg) => IpcError::Read(msg),
            ThemeError::Store(msg) => IpcError::Store(msg),
            ThemeError::Package(msg) => IpcError::Package(msg),
        }
    }
}

pub type ReplySender = oneshot::Sender<Result<Response, IpcError>>;

/// Everything delivered to the environment's run loop.
#[derive(Debug)]
pub enum Envelope {
    Request {
        sender: ContentsId,
        request: Request,
        reply: ReplySender,
    },
    Notification {
        sender: ContentsId,
        notification: Notification,
    },
    Window {
        id: ContentsId,
        event: WindowEvent,
    },
    /// Window content asked to open a popup
    Popup {
        sender: ContentsId,
        url: String,
        frame_name: String,
        reply: oneshot::Sender<PopupDecision>,
    },
    Lifecycle(LifecycleEvent),
}

/// Receiving end of the bus, owned by the run loop.
pub type Inbox = mpsc::Receiver<Envelope>;

/// Sending end of the bus. Cheap to clone; one per host integration point.
#[derive(Debug, Clone)]
pub struct IpcBus {
    tx: mpsc::Sender<Envelope>,
}

impl IpcBus {
    pub fn channel(capacity: usize) -> (Self, Inbox) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Send a request and wait for its response.
    pub async fn request(
        &self,
        sender: ContentsId,
        request: Request,
    ) -> Result<Response, IpcError> {
        let (reply, rx) = oneshot::channel();
        self.send(Envelope::Request {
            sender,
            request,
            reply,
        })
        .await?;
        rx.await.unwrap_or(Err(IpcError::ChannelClosed))
    }

    pub async fn notify(
        &self,
        sender: ContentsId,
        notification: Notification,
    ) -> Result<(), IpcError> {
        self.send(Envelope::Notification {
            sender,
            notification,
        })
        .await
    }

    pub async fn window_event(&self, id: ContentsId, event: WindowEvent) -> Result<(), IpcError> {
        self.send(Envelope::Window { id, event }).await
    }

    /// Ask the shell what to do with a popup and wait for the decision.
    pub async fn popup(
        &self,
        sender: ContentsId,
        url: impl Into<String>,
        frame_name: impl Into<String>,
    ) -> Result<PopupDecision, IpcError> {
        let (reply, rx) = oneshot::channel();
        self.send(Envelope::Popup {
            sender,
            url: url.into(),
            frame_name: frame_name.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| IpcError::ChannelClosed)
    }

    pub async fn lifecycle(&self, event: LifecycleEvent) -> Result<(), IpcError> {
        self.send(Envelope::Lifecycle(event)).await
    }

    async fn send(&self, envelope: Envelope) -> Result<(), IpcError> {
        self.tx
            .send(envelope)
            .await
            .map_err(|_| IpcError::ChannelClosed)
    }
}
