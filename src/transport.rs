//! Push transport: one websocket per room per screen role.
//!
//! The server is send-only on this socket — every text frame is a full JSON
//! snapshot of the room's accessible message stream. Close frames carry a
//! reason string; one reserved value denotes duplicate-executor rejection and
//! is surfaced as a typed [`DisconnectReason`] for the arbiter.

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::PanelflowError;
use crate::message::Message;

/// Close reason the server sends when a second executor tries to connect.
pub const DUPLICATE_EXECUTOR_REASON: &str = "実行者重複";

// ---------------------------------------------------------------------------
// Roles and screens
// ---------------------------------------------------------------------------

/// Privilege level of a room connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RoomRole {
    /// May start/stop/intervene; at most one per room.
    Exec,
    /// Observe-only.
    View,
}

impl std::fmt::Display for RoomRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomRole::Exec => write!(f, "exec"),
            RoomRole::View => write!(f, "view"),
        }
    }
}

/// Which presentation surface this connection feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ScreenName {
    /// Chat-log surface; relies on push delivery.
    Chat,
    /// Typing/presentation surface; pulls its own stream content.
    Typing,
}

impl std::fmt::Display for ScreenName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScreenName::Chat => write!(f, "chat"),
            ScreenName::Typing => write!(f, "typing"),
        }
    }
}

// ---------------------------------------------------------------------------
// Disconnect reasons
// ---------------------------------------------------------------------------

/// Why a push connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The reserved duplicate-executor rejection.
    DuplicateExecutor,
    /// Any other close or transport failure; opaque to this core.
    Other(String),
}

impl DisconnectReason {
    pub fn from_close(frame: Option<CloseFrame<'_>>) -> Self {
        match frame {
            Some(f) if f.reason == DUPLICATE_EXECUTOR_REASON => {
                DisconnectReason::DuplicateExecutor
            }
            Some(f) => DisconnectReason::Other(format!("{} (code {})", f.reason, f.code)),
            None => DisconnectReason::Other("connection closed".to_string()),
        }
    }

    pub fn is_duplicate_executor(&self) -> bool {
        matches!(self, DisconnectReason::DuplicateExecutor)
    }
}

// ---------------------------------------------------------------------------
// Snapshot source seam
// ---------------------------------------------------------------------------

/// What a snapshot provider can deliver.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// A full snapshot of the room's message stream.
    Snapshot(Vec<Message>),
    /// The provider is gone; the reason feeds the exclusivity arbiter.
    Closed(DisconnectReason),
}

/// A provider of message-stream snapshots.
///
/// Push and pull are two implementations of this one capability; the
/// controller is agnostic to which one feeds it.
pub trait SnapshotSource: Send {
    /// Wait for the next event. `None` means the source is exhausted.
    fn next_event(&mut self) -> BoxFuture<'_, Option<SourceEvent>>;
}

// ---------------------------------------------------------------------------
// SessionTransport
// ---------------------------------------------------------------------------

/// The push connection for one room and screen role.
pub struct SessionTransport {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    room_id: u64,
    closed: bool,
}

impl SessionTransport {
    /// Connect to the room's push endpoint.
    ///
    /// The duplicate-executor rejection is not reported here: the server
    /// accepts and then immediately closes, so the rejection surfaces as the
    /// first event from [`SnapshotSource::next_event`].
    pub async fn connect(
        config: &ClientConfig,
        room_id: u64,
        role: RoomRole,
        screen: ScreenName,
    ) -> Result<Self, PanelflowError> {
        let url = format!(
            "{}/ws/chat?room_id={}&chat_room_mode={}&screen_name={}",
            config.ws_base_url, room_id, role, screen
        );
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| PanelflowError::Connect {
                url: url.clone(),
                detail: e.to_string(),
            })?;
        debug!(room_id, %role, %screen, "push transport connected");
        Ok(SessionTransport {
            ws,
            room_id,
            closed: false,
        })
    }

    pub fn room_id(&self) -> u64 {
        self.room_id
    }
}

impl SnapshotSource for SessionTransport {
    fn next_event(&mut self) -> BoxFuture<'_, Option<SourceEvent>> {
        Box::pin(async move {
            if self.closed {
                return None;
            }
            while let Some(frame) = self.ws.next().await {
                match frame {
                    Ok(WsMessage::Text(body)) => {
                        match serde_json::from_str::<Vec<Message>>(&body) {
                            Ok(snapshot) => return Some(SourceEvent::Snapshot(snapshot)),
                            Err(e) => {
                                // Parse failure surfaces as an unchanged
                                // stream, never a crash.
                                warn!(room_id = self.room_id, error = %e, "unparseable snapshot frame dropped");
                            }
                        }
                    }
                    Ok(WsMessage::Close(frame)) => {
                        self.closed = true;
                        return Some(SourceEvent::Closed(DisconnectReason::from_close(frame)));
                    }
                    Ok(_) => {} // ping/pong/binary — nothing for us
                    Err(e) => {
                        self.closed = true;
                        return Some(SourceEvent::Closed(DisconnectReason::Other(e.to_string())));
                    }
                }
            }
            self.closed = true;
            Some(SourceEvent::Closed(DisconnectReason::Other(
                "connection closed".to_string(),
            )))
        })
    }
}
