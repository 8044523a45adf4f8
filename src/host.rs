//! Line-delimited JSON bridge to an out-of-process host.
//!
//! Each input line is one `HostMessage`. Requests are answered on the shared
//! sink with a `response` line carrying the caller's `id`. Everything else is
//! forwarded to the bus without a reply.

use std::io::Write;

use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::ipc::{IpcBus, IpcError, LifecycleEvent, Notification, Request, UpdateEvent};
use crate::window::headless::Sink;
use crate::window::{ContentsId, WindowEvent};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum HostMessage {
    Request {
        sender: u64,
        #[serde(default)]
        id: Option<u64>,
        request: Request,
    },
    Notification {
        sender: u64,
        notification: Notification,
    },
    Window {
        window: u64,
        event: WindowEvent,
    },
    /// Window content asked to open a popup; answered with the decision
    Popup {
        window: u64,
        #[serde(default)]
        id: Option<u64>,
        url: String,
        #[serde(default, rename = "frameName")]
        frame_name: String,
    },
    AllWindowsClosed,
    Activate,
    NativeTheme {
        dark: bool,
    },
    Update {
        event: UpdateEvent,
    },
}

impl HostMessage {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Read host messages until the input ends or the bus closes.
pub async fn serve<R>(reader: R, bus: IpcBus, sink: Sink) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let message = match HostMessage::parse(line) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Ignoring malformed host message: {}", e);
                emit(&sink, json!({"kind": "error", "message": e.to_string()}));
                continue;
            }
        };

        let delivered = match message {
            HostMessage::Request {
                sender,
                id,
                request,
            } => {
                let value = match bus.request(ContentsId(sender), request).await {
                    Ok(response) => json!({"kind": "response", "id": id, "ok": response}),
                    Err(IpcError::ChannelClosed) => break,
                    Err(e) => json!({"kind": "response", "id": id, "error": e}),
                };
                emit(&sink, value);
                Ok(())
            }
            HostMessage::Notification {
                sender,
                notification,
            } => bus.notify(ContentsId(sender), notification).await,
            HostMessage::Window { window, event } => {
                bus.window_event(ContentsId(window), event).await
            }
            HostMessage::Popup {
                window,
                id,
                url,
                frame_name,
            } => match bus.popup(ContentsId(window), url, frame_name).await {
                Ok(decision) => {
                    emit(&sink, json!({"kind": "popup", "id": id, "decision": decision}));
                    Ok(())
                }
                Err(e) => Err(e),
            },
            HostMessage::AllWindowsClosed => {
                bus.lifecycle(LifecycleEvent::AllWindowsClosed).await
            }
            HostMessage::Activate => bus.lifecycle(LifecycleEvent::Activate).await,
            HostMessage::NativeTheme { dark } => {
                bus.lifecycle(LifecycleEvent::NativeThemeUpdated { dark }).await
            }
            HostMessage::Update { event } => {
                bus.lifecycle(LifecycleEvent::Update(event)).await
            }
        };
        if delivered.is_err() {
            tracing::debug!("Shell stopped, closing host bridge");
            break;
        }
    }
    Ok(())
}

fn emit(sink: &Sink, value: serde_json::Value) {
    if let Ok(mut sink) = sink.lock() {
        let _ = writeln!(sink, "{value}");
        let _ = sink.flush();
    }
}
