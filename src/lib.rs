//! panelflow — discussion session synchronization and timed-reveal engine.
//!
//! A human "executor" drives a multi-party simulated discussion among AI
//! panelists while "viewers" watch it unfold. This crate is the client-side
//! core: it tracks the ordered message stream for one room over push
//! (websocket) and pull (HTTP polling) transports, arbitrates that only one
//! executor holds a room at a time, and paces the on-screen reveal of each
//! utterance so text, animation, and synthesized speech stay in lockstep and
//! cancel together.
//!
//! Pipeline: [`transport::SessionTransport`] / [`poll::PollingRequester`] →
//! [`message::MessageStream`] → [`controller::DiscussionSessionController`] →
//! [`speech::SpeechSynchronizer`] → [`reveal::RevealEngine`] → presentation.
//! [`arbiter::ExclusivityArbiter`] observes the transport independently and
//! can pre-empt the whole pipeline.

pub mod api;
pub mod arbiter;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod message;
pub mod poll;
pub mod reveal;
pub mod speech;
pub mod transport;

pub use api::{ApiClient, InterventionEnvelope, StartDiscussionRequest, StartDiscussionResponse};
pub use arbiter::{ExclusivityArbiter, ExclusivityVerdict};
pub use config::{ClientConfig, TimingConfig};
pub use controller::{
    new_shared_status, DiscussionSessionController, SessionState, SessionStatus, SharedStatus,
    SnapshotOutcome,
};
pub use error::PanelflowError;
pub use message::{LifecycleState, Message, MessageKind, MessageStream, Participant};
pub use poll::PollingRequester;
pub use reveal::{repair_markup, RevealDriver, RevealEngine, RevealFrame, RevealTick};
pub use speech::{split_sentences, AudioSink, NullSink, RevealCursor, SpeechEvent, SpeechSynchronizer};
pub use transport::{
    DisconnectReason, RoomRole, ScreenName, SessionTransport, SnapshotSource, SourceEvent,
};
