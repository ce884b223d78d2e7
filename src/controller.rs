//! Session orchestration: the state machine that owns the shared session
//! status, decides when to request more messages, and surfaces stream
//! updates to the presentation pipeline.
//!
//! ## Design
//! - One controller per mounted room view. The controller is the single
//!   mutator of [`SessionStatus`]; sibling presentation components read it
//!   through the shared handle.
//! - Timers are owned: the intervention follow-up request is a stored
//!   `JoinHandle` aborted on every transition that invalidates it and on
//!   drop. The poll cadence lives inside the pull source; the driving loop
//!   stops pumping once the controller reports `Ended`.
//! - A failed start/intervention leaves the state machine where it was so
//!   the user may resubmit; a failed poll arrives as an empty snapshot and
//!   is ignored.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, InterventionEnvelope, StartDiscussionRequest, StartDiscussionResponse};
use crate::config::TimingConfig;
use crate::error::PanelflowError;
use crate::message::{LifecycleState, Message, MessageStream, Participant};
use crate::transport::RoomRole;

// ---------------------------------------------------------------------------
// Shared session status
// ---------------------------------------------------------------------------

/// Per-room-view session status, shared by sibling components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub is_running: bool,
    pub uses_cache: bool,
}

/// Shared handle: one writer (the controller), any number of readers.
pub type SharedStatus = Arc<Mutex<SessionStatus>>;

/// Create a fresh status handle for a newly mounted room view.
pub fn new_shared_status() -> SharedStatus {
    Arc::new(Mutex::new(SessionStatus::default()))
}

// ---------------------------------------------------------------------------
// States and outcomes
// ---------------------------------------------------------------------------

/// Where the session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Before the view mounts.
    Idle,
    /// Mounted; agenda/config selection may be submitted.
    Configuring,
    /// Start accepted; waiting for the first start sentinel.
    AwaitingRoster,
    /// Roster known; messages presentable, advance affordance live.
    Presenting,
    /// A user intervention was submitted; input held until content resumes.
    Intervening,
    /// The stream's tail is an end sentinel.
    Ended,
}

/// What applying a snapshot produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotOutcome {
    /// Empty snapshot — a failed or vacuous poll; nothing applied.
    Ignored,
    /// Stream replaced; no new tail utterance to present.
    Applied,
    /// Stream replaced and the tail is a new utterance for the reveal
    /// pipeline. Any in-flight reveal is superseded by it.
    NewUtterance(Message),
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Orchestrates one room view's session lifecycle.
pub struct DiscussionSessionController {
    api: ApiClient,
    room_id: u64,
    role: RoomRole,
    supports_restart: bool,
    timing: TimingConfig,
    state: SessionState,
    status: SharedStatus,
    stream: MessageStream,
    roster: Vec<Participant>,
    tech_enable: bool,
    advance_enabled: bool,
    input_enabled: bool,
    presented_len: usize,
    followup_task: Option<JoinHandle<()>>,
}

impl DiscussionSessionController {
    pub fn new(
        api: ApiClient,
        room_id: u64,
        role: RoomRole,
        status: SharedStatus,
        timing: TimingConfig,
        supports_restart: bool,
    ) -> Self {
        DiscussionSessionController {
            api,
            room_id,
            role,
            supports_restart,
            timing,
            state: SessionState::Idle,
            status,
            stream: MessageStream::new(),
            roster: Vec::new(),
            tech_enable: false,
            advance_enabled: false,
            input_enabled: false,
            presented_len: 0,
            followup_task: None,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn room_id(&self) -> u64 {
        self.room_id
    }

    pub fn stream(&self) -> &MessageStream {
        &self.stream
    }

    pub fn roster(&self) -> &[Participant] {
        &self.roster
    }

    /// Voice/avatar parameters for a speaker, when the roster knows them.
    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.roster.iter().find(|p| p.name == name)
    }

    pub fn tech_enable(&self) -> bool {
        self.tech_enable
    }

    pub fn advance_enabled(&self) -> bool {
        self.advance_enabled
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    /// Current pull cadence: slower when the server answers from cache.
    pub fn poll_interval(&self) -> std::time::Duration {
        if self.status.lock().map(|s| s.uses_cache).unwrap_or(false) {
            self.timing.poll_interval_cached
        } else {
            self.timing.poll_interval
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle actions
    // -----------------------------------------------------------------------

    /// View mount: the session becomes configurable.
    pub fn mount(&mut self) {
        if self.state == SessionState::Idle {
            self.state = SessionState::Configuring;
        }
    }

    /// Submit the agenda/config selection and start a discussion round.
    ///
    /// On failure the state machine stays in `Configuring` so the selection
    /// can be resubmitted.
    pub async fn start(
        &mut self,
        selection: StartDiscussionRequest,
    ) -> Result<StartDiscussionResponse, PanelflowError> {
        if self.state != SessionState::Configuring {
            return Err(PanelflowError::Rejected(format!(
                "start not available in state {:?}",
                self.state
            )));
        }
        let response = self.api.start_discussion(&selection).await?;
        self.tech_enable = selection.tech_enable;
        if let Ok(mut status) = self.status.lock() {
            status.is_running = true;
            status.uses_cache = response.exist_cache;
        }
        self.state = SessionState::AwaitingRoster;
        info!(
            room_id = self.room_id,
            uses_cache = response.exist_cache,
            "discussion round started"
        );
        Ok(response)
    }

    /// The executor's advance affordance: ask the server to make one more
    /// message accessible. The returned snapshot is also broadcast to push
    /// surfaces, so callers on a push surface may ignore it.
    pub async fn request_next(&self) -> Result<Vec<Message>, PanelflowError> {
        if !self.advance_enabled {
            return Err(PanelflowError::Rejected(
                "advance affordance is not available".to_string(),
            ));
        }
        self.api.next_message_batch(self.room_id).await
    }

    /// Submit a user intervention, starting an additional round.
    ///
    /// Disables further input until the stream resumes, and schedules one
    /// extra batch request after a short delay so server-side processing
    /// settles before the stream is re-queried. On failure the state machine
    /// stays put and input remains enabled.
    pub async fn intervene(
        &mut self,
        user_name: &str,
        text: &str,
    ) -> Result<(), PanelflowError> {
        if self.state != SessionState::Presenting && self.state != SessionState::Ended {
            return Err(PanelflowError::Rejected(format!(
                "intervention not available in state {:?}",
                self.state
            )));
        }
        if !self.input_enabled {
            return Err(PanelflowError::Rejected(
                "intervention input is disabled".to_string(),
            ));
        }
        let envelope =
            InterventionEnvelope::new(user_name, text, self.room_id, self.tech_enable);
        self.api.send_intervention(&envelope).await?;

        if let Ok(mut status) = self.status.lock() {
            status.is_running = true;
        }
        self.input_enabled = false;
        self.state = SessionState::Intervening;
        self.schedule_followup();
        Ok(())
    }

    /// Stop the round and reset to the configuration state. The server
    /// discards the room's stream.
    pub async fn stop(&mut self) -> Result<(), PanelflowError> {
        self.api.stop_discussion(self.room_id).await?;
        self.abort_followup();
        self.stream.clear();
        self.presented_len = 0;
        self.roster.clear();
        self.advance_enabled = false;
        self.input_enabled = false;
        if let Ok(mut status) = self.status.lock() {
            *status = SessionStatus::default();
        }
        self.state = SessionState::Configuring;
        info!(room_id = self.room_id, "discussion stopped");
        Ok(())
    }

    /// After an ended round, return to configuration for a new agenda.
    /// Only available where the view supports restart.
    pub fn restart(&mut self) -> Result<(), PanelflowError> {
        if self.state != SessionState::Ended || !self.supports_restart {
            return Err(PanelflowError::Rejected(
                "restart is not available".to_string(),
            ));
        }
        self.state = SessionState::Configuring;
        Ok(())
    }

    /// View unmount / exclusivity eviction: cancel owned timers and mark the
    /// session not running. Idempotent.
    pub fn teardown(&mut self) {
        self.abort_followup();
        self.advance_enabled = false;
        self.input_enabled = false;
        if let Ok(mut status) = self.status.lock() {
            status.is_running = false;
        }
    }

    // -----------------------------------------------------------------------
    // Snapshot application
    // -----------------------------------------------------------------------

    /// Apply one full snapshot in receipt order.
    ///
    /// The newest snapshot's tail is authoritative: when it carries a new
    /// utterance, the caller must discard any unfinished reveal and present
    /// the new tail.
    pub fn apply_snapshot(&mut self, snapshot: Vec<Message>) -> SnapshotOutcome {
        if snapshot.is_empty() {
            return SnapshotOutcome::Ignored;
        }
        let new_len = snapshot.len();
        let grew = new_len > self.presented_len;
        self.stream.replace(snapshot);
        self.presented_len = new_len;

        // Roster is fixed by the first start sentinel; the tech flag follows
        // the last one.
        if self.roster.is_empty() {
            self.roster = self.stream.roster();
            if !self.roster.is_empty() {
                debug!(
                    room_id = self.room_id,
                    participants = self.roster.len(),
                    "roster extracted"
                );
            }
        }
        if let Some(tech) = self.stream.tech_enabled() {
            self.tech_enable = tech;
        }

        match self.stream.lifecycle_state() {
            LifecycleState::NotStarted => {}
            LifecycleState::AwaitingRoster | LifecycleState::InProgress => {
                self.enter_presenting();
            }
            LifecycleState::Ended => {
                self.enter_ended();
            }
        }

        if grew {
            if let Some(tail) = self.stream.tail() {
                if tail.is_utterance() {
                    return SnapshotOutcome::NewUtterance(tail.clone());
                }
            }
        }
        SnapshotOutcome::Applied
    }

    fn enter_presenting(&mut self) {
        match self.state {
            SessionState::Configuring
            | SessionState::AwaitingRoster
            | SessionState::Intervening
            | SessionState::Ended => {
                self.state = SessionState::Presenting;
                self.advance_enabled = true;
                self.input_enabled = self.role == RoomRole::Exec;
                if let Ok(mut status) = self.status.lock() {
                    status.is_running = true;
                }
            }
            SessionState::Presenting => {}
            SessionState::Idle => {
                warn!(room_id = self.room_id, "snapshot before mount ignored for state");
            }
        }
    }

    fn enter_ended(&mut self) {
        if self.state == SessionState::Ended {
            return;
        }
        self.state = SessionState::Ended;
        self.advance_enabled = false;
        // Input comes back only where restart is supported, and only when the
        // round actually produced content.
        self.input_enabled =
            self.supports_restart && self.role == RoomRole::Exec && self.stream.has_utterance();
        self.abort_followup();
        if let Ok(mut status) = self.status.lock() {
            status.is_running = false;
        }
        info!(room_id = self.room_id, "discussion round ended");
    }

    // -----------------------------------------------------------------------
    // Owned timers
    // -----------------------------------------------------------------------

    fn schedule_followup(&mut self) {
        self.abort_followup();
        let api = self.api.clone();
        let room_id = self.room_id;
        let delay = self.timing.intervention_followup_delay;
        self.followup_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The response rides back on the regular snapshot channels; only
            // the nudge matters here.
            if let Err(e) = api.next_message_batch(room_id).await {
                warn!(room_id, error = %e, "intervention follow-up request failed");
            }
        }));
    }

    fn abort_followup(&mut self) {
        if let Some(task) = self.followup_task.take() {
            task.abort();
        }
    }
}

impl Drop for DiscussionSessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}
