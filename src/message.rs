//! Wire message model and the per-room message stream.
//!
//! ## Design
//! - `Message` mirrors the server's JSON shape field-for-field; everything is
//!   optional on the wire.
//! - Both transports deliver full snapshots of a room's stream, never deltas.
//!   `MessageStream::replace` swaps the whole sequence atomically and each
//!   replace is a discrete event, not a diff.
//! - Lifecycle boundaries ride inside the stream as `system_info` sentinel
//!   messages; classification scans for them rather than tracking state on
//!   the side, so a reconnecting client recovers the right state from any
//!   snapshot.

use serde::{Deserialize, Serialize};

/// Sentinel text marking the start of a discussion round.
pub const LIFECYCLE_START_TEXT: &str = "議論開始";

/// Sentinel text marking the end of a discussion round.
pub const LIFECYCLE_END_TEXT: &str = "議論終了";

// ---------------------------------------------------------------------------
// Wire message
// ---------------------------------------------------------------------------

/// Wire-level message type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireType {
    /// A panelist or user utterance.
    Message,
    /// A system notice; lifecycle sentinels use this tag.
    SystemInfo,
    /// An intervention-in-progress indicator, meaningful only at the tail.
    OptInfo,
}

/// One entry in a room's message stream, as the server serializes it.
///
/// Immutable once appended to a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub msg_type: Option<WireType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handover_datum: Option<serde_json::Value>,
}

/// Which lifecycle sentinel a `system_info` message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    Start,
    End,
}

/// Semantic classification of a wire message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Panelist or user speech to present.
    Utterance,
    /// A discussion lifecycle boundary.
    Lifecycle(Sentinel),
    /// Intervention-in-progress indicator.
    Intervention,
    /// Any other system notice (e.g. a server-side cache error).
    Notice,
}

impl Message {
    /// Build an utterance message. Text is sanitized before storage so a
    /// locally rendered echo can never inject markup.
    pub fn utterance(user_name: &str, text: &str) -> Self {
        Message {
            msg_type: Some(WireType::Message),
            user_name: Some(user_name.to_string()),
            msg_text: Some(sanitize_markup(text)),
            timestamp: None,
            time: None,
            user_img: None,
            handover_datum: None,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self.msg_type {
            Some(WireType::Message) => MessageKind::Utterance,
            Some(WireType::OptInfo) => MessageKind::Intervention,
            Some(WireType::SystemInfo) => match self.msg_text.as_deref() {
                Some(LIFECYCLE_START_TEXT) => MessageKind::Lifecycle(Sentinel::Start),
                Some(LIFECYCLE_END_TEXT) => MessageKind::Lifecycle(Sentinel::End),
                _ => MessageKind::Notice,
            },
            None => MessageKind::Notice,
        }
    }

    pub fn is_utterance(&self) -> bool {
        self.kind() == MessageKind::Utterance
    }

    pub fn is_lifecycle_start(&self) -> bool {
        self.kind() == MessageKind::Lifecycle(Sentinel::Start)
    }

    pub fn is_lifecycle_end(&self) -> bool {
        self.kind() == MessageKind::Lifecycle(Sentinel::End)
    }

    /// Message text, or empty when absent.
    pub fn text(&self) -> &str {
        self.msg_text.as_deref().unwrap_or("")
    }

    /// Speaker name, or empty for system messages without one.
    pub fn speaker(&self) -> &str {
        self.user_name.as_deref().unwrap_or("")
    }
}

/// Escape markup-significant characters so message text can neither break the
/// server's JSON envelope rendering nor inject elements into local markup.
///
/// Applied before transmission and before local rendering.
pub fn sanitize_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Participant roster
// ---------------------------------------------------------------------------

/// One discussion participant, extracted from the start sentinel's handover
/// payload. Drives avatar display and per-speaker voice parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    #[serde(rename = "image", default)]
    pub avatar: String,
    #[serde(default = "default_pitch")]
    pub voice_pitch: f64,
    #[serde(default)]
    pub voice_id: u32,
}

fn default_pitch() -> f64 {
    1.0
}

/// Extract the participant roster from a start sentinel's handover payload.
///
/// Best-effort: missing or malformed handover data yields an empty roster,
/// never an error. An empty roster is an acceptable degraded state.
pub fn roster_from_handover(handover: &serde_json::Value) -> Vec<Participant> {
    handover
        .get("participants_config")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Lifecycle classification
// ---------------------------------------------------------------------------

/// Where the stream's current discussion round stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No start sentinel present yet.
    NotStarted,
    /// A round has been announced but no utterance has arrived for it.
    AwaitingRoster,
    /// Utterances are flowing for the current round.
    InProgress,
    /// The tail is an end sentinel; over until a new start arrives.
    Ended,
}

// ---------------------------------------------------------------------------
// MessageStream
// ---------------------------------------------------------------------------

/// The ordered, append-only view of one room's discussion messages.
///
/// Owned exclusively by the view that mounted it; no cross-room scope.
#[derive(Debug, Default)]
pub struct MessageStream {
    messages: Vec<Message>,
}

impl MessageStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically swap the in-memory sequence with a fresh snapshot.
    pub fn replace(&mut self, snapshot: Vec<Message>) {
        self.messages = snapshot;
    }

    /// Drop all messages (session teardown / server-side reset).
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn tail(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// True when at least one utterance has ever been revealed.
    pub fn has_utterance(&self) -> bool {
        self.messages.iter().any(Message::is_utterance)
    }

    /// Classify the stream by scanning for lifecycle sentinels.
    ///
    /// Additional rounds append a new start sentinel after a prior end; the
    /// last start anchors the current round. A snapshot containing only
    /// sentinels is `AwaitingRoster` or `Ended`, never "has content".
    pub fn lifecycle_state(&self) -> LifecycleState {
        if self.tail().is_some_and(Message::is_lifecycle_end) {
            return LifecycleState::Ended;
        }
        let last_start = match self
            .messages
            .iter()
            .rposition(Message::is_lifecycle_start)
        {
            Some(idx) => idx,
            None => return LifecycleState::NotStarted,
        };
        if self.messages[last_start..].iter().any(Message::is_utterance) {
            LifecycleState::InProgress
        } else {
            LifecycleState::AwaitingRoster
        }
    }

    /// Participant roster from the first start sentinel. Fixed for the
    /// session's duration.
    pub fn roster(&self) -> Vec<Participant> {
        self.messages
            .iter()
            .find(|m| m.is_lifecycle_start())
            .and_then(|m| m.handover_datum.as_ref())
            .map(roster_from_handover)
            .unwrap_or_default()
    }

    /// The current round's handover payload (agenda/config echo, language,
    /// tech flag) — what a late-joining or refreshing client needs to
    /// reconstruct the session configuration.
    pub fn handover(&self) -> Option<&serde_json::Value> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_lifecycle_start())
            .and_then(|m| m.handover_datum.as_ref())
    }

    /// Tech flag from the *last* start sentinel — an additional round can
    /// toggle it, unlike the roster.
    pub fn tech_enabled(&self) -> Option<bool> {
        self.handover()
            .and_then(|h| h.get("tech_enable"))
            .and_then(serde_json::Value::as_bool)
    }
}
