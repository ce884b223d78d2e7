//! Tests for the session controller — state transitions driven by snapshots,
//! affordance gating, outcome reporting, and status ownership.

use panelflow::message::{Message, WireType, LIFECYCLE_END_TEXT, LIFECYCLE_START_TEXT};
use panelflow::{
    new_shared_status, ApiClient, ClientConfig, DiscussionSessionController, PanelflowError,
    RoomRole, SessionState, SharedStatus, SnapshotOutcome,
};
use serde_json::json;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn controller_with_status(
    role: RoomRole,
    supports_restart: bool,
) -> (DiscussionSessionController, SharedStatus) {
    let config = ClientConfig::default();
    let api = ApiClient::new(&config).unwrap();
    let status = new_shared_status();
    let controller = DiscussionSessionController::new(
        api,
        1,
        role,
        status.clone(),
        config.timing(),
        supports_restart,
    );
    (controller, status)
}

fn controller(role: RoomRole, supports_restart: bool) -> DiscussionSessionController {
    controller_with_status(role, supports_restart).0
}

fn utterance(name: &str, text: &str) -> Message {
    Message {
        msg_type: Some(WireType::Message),
        user_name: Some(name.to_string()),
        msg_text: Some(text.to_string()),
        timestamp: None,
        time: None,
        user_img: None,
        handover_datum: None,
    }
}

fn start_sentinel() -> Message {
    Message {
        msg_type: Some(WireType::SystemInfo),
        user_name: Some("system".to_string()),
        msg_text: Some(LIFECYCLE_START_TEXT.to_string()),
        timestamp: None,
        time: None,
        user_img: None,
        handover_datum: Some(json!({
            "participants_config": [
                {"name": "A", "image": "/images/a.png", "voice_pitch": 1, "voice_id": 0}
            ],
            "lang": "ja",
            "tech_enable": true,
            "is_select_agenda": true
        })),
    }
}

fn end_sentinel() -> Message {
    Message {
        msg_type: Some(WireType::SystemInfo),
        user_name: Some("system".to_string()),
        msg_text: Some(LIFECYCLE_END_TEXT.to_string()),
        timestamp: None,
        time: None,
        user_img: None,
        handover_datum: None,
    }
}

fn opt_info() -> Message {
    Message {
        msg_type: Some(WireType::OptInfo),
        user_name: None,
        msg_text: None,
        timestamp: None,
        time: None,
        user_img: None,
        handover_datum: None,
    }
}

// ---------------------------------------------------------------------------
// Mounting
// ---------------------------------------------------------------------------

#[test]
fn test_new_controller_is_idle() {
    assert_eq!(controller(RoomRole::View, false).state(), SessionState::Idle);
}

#[test]
fn test_mount_enters_configuring() {
    let mut c = controller(RoomRole::View, false);
    c.mount();
    assert_eq!(c.state(), SessionState::Configuring);
}

#[test]
fn test_mount_is_idempotent() {
    let mut c = controller(RoomRole::View, false);
    c.mount();
    c.mount();
    assert_eq!(c.state(), SessionState::Configuring);
}

// ---------------------------------------------------------------------------
// Snapshot application
// ---------------------------------------------------------------------------

#[test]
fn test_empty_snapshot_is_ignored() {
    let mut c = controller(RoomRole::View, false);
    c.mount();
    assert_eq!(c.apply_snapshot(Vec::new()), SnapshotOutcome::Ignored);
    assert_eq!(c.state(), SessionState::Configuring);
}

#[test]
fn test_start_sentinel_unblocks_advance_and_extracts_roster() {
    let mut c = controller(RoomRole::Exec, true);
    c.mount();
    let outcome = c.apply_snapshot(vec![start_sentinel()]);
    assert_eq!(outcome, SnapshotOutcome::Applied);
    assert_eq!(c.state(), SessionState::Presenting);
    assert!(c.advance_enabled());
    assert_eq!(c.roster().len(), 1);
    assert_eq!(c.roster()[0].name, "A");
    assert!(c.tech_enable());
}

#[test]
fn test_viewer_never_gets_input() {
    let mut c = controller(RoomRole::View, false);
    c.mount();
    c.apply_snapshot(vec![start_sentinel(), utterance("A", "hi")]);
    assert_eq!(c.state(), SessionState::Presenting);
    assert!(!c.input_enabled());
}

#[test]
fn test_executor_gets_input_while_presenting() {
    let mut c = controller(RoomRole::Exec, true);
    c.mount();
    c.apply_snapshot(vec![start_sentinel(), utterance("A", "hi")]);
    assert!(c.input_enabled());
}

#[test]
fn test_new_tail_utterance_is_reported() {
    let mut c = controller(RoomRole::View, false);
    c.mount();
    c.apply_snapshot(vec![start_sentinel()]);
    let outcome = c.apply_snapshot(vec![start_sentinel(), utterance("A", "こんにちは。")]);
    match outcome {
        SnapshotOutcome::NewUtterance(message) => {
            assert_eq!(message.speaker(), "A");
            assert_eq!(message.text(), "こんにちは。");
        }
        other => panic!("expected NewUtterance, got {other:?}"),
    }
}

#[test]
fn test_unchanged_snapshot_reports_applied() {
    let mut c = controller(RoomRole::View, false);
    c.mount();
    let snapshot = vec![start_sentinel(), utterance("A", "hi")];
    c.apply_snapshot(snapshot.clone());
    assert_eq!(c.apply_snapshot(snapshot), SnapshotOutcome::Applied);
}

#[test]
fn test_opt_info_tail_is_not_an_utterance() {
    let mut c = controller(RoomRole::View, false);
    c.mount();
    c.apply_snapshot(vec![start_sentinel()]);
    let outcome =
        c.apply_snapshot(vec![start_sentinel(), utterance("A", "hi"), opt_info()]);
    assert_eq!(outcome, SnapshotOutcome::Applied);
}

#[test]
fn test_shrunken_snapshot_resets_growth_tracking() {
    let mut c = controller(RoomRole::View, false);
    c.mount();
    c.apply_snapshot(vec![start_sentinel(), utterance("A", "one"), utterance("B", "two")]);
    // Server-side reset to a shorter stream.
    assert_eq!(
        c.apply_snapshot(vec![start_sentinel()]),
        SnapshotOutcome::Applied
    );
    // Growth from the new baseline is reported again.
    assert!(matches!(
        c.apply_snapshot(vec![start_sentinel(), utterance("C", "three")]),
        SnapshotOutcome::NewUtterance(_)
    ));
}

// ---------------------------------------------------------------------------
// Ending
// ---------------------------------------------------------------------------

#[test]
fn test_end_sentinel_enters_ended_and_stops_running() {
    let (mut c, status) = controller_with_status(RoomRole::Exec, true);
    c.mount();
    c.apply_snapshot(vec![start_sentinel(), utterance("A", "hi")]);
    assert!(status.lock().unwrap().is_running);
    c.apply_snapshot(vec![start_sentinel(), utterance("A", "hi"), end_sentinel()]);
    assert_eq!(c.state(), SessionState::Ended);
    assert!(!c.advance_enabled());
    assert!(!status.lock().unwrap().is_running);
}

#[test]
fn test_input_reenabled_at_end_when_restart_supported() {
    let mut c = controller(RoomRole::Exec, true);
    c.mount();
    c.apply_snapshot(vec![start_sentinel(), utterance("A", "hi"), end_sentinel()]);
    assert!(c.input_enabled());
}

#[test]
fn test_input_stays_disabled_at_end_without_content() {
    // End sentinel with no prior utterances: no content was ever produced.
    let mut c = controller(RoomRole::Exec, true);
    c.mount();
    c.apply_snapshot(vec![start_sentinel(), end_sentinel()]);
    assert_eq!(c.state(), SessionState::Ended);
    assert!(!c.input_enabled());
}

#[test]
fn test_input_stays_disabled_at_end_without_restart_support() {
    let mut c = controller(RoomRole::Exec, false);
    c.mount();
    c.apply_snapshot(vec![start_sentinel(), utterance("A", "hi"), end_sentinel()]);
    assert!(!c.input_enabled());
}

#[test]
fn test_new_round_after_end_resumes_presenting() {
    let mut c = controller(RoomRole::View, false);
    c.mount();
    c.apply_snapshot(vec![start_sentinel(), utterance("A", "hi"), end_sentinel()]);
    assert_eq!(c.state(), SessionState::Ended);
    c.apply_snapshot(vec![
        start_sentinel(),
        utterance("A", "hi"),
        end_sentinel(),
        start_sentinel(),
        utterance("B", "more"),
    ]);
    assert_eq!(c.state(), SessionState::Presenting);
}

// ---------------------------------------------------------------------------
// Full progression
// ---------------------------------------------------------------------------

#[test]
fn test_snapshot_sequence_walks_states_forward() {
    let mut c = controller(RoomRole::View, false);
    c.mount();
    let mut observed = vec![c.state()];
    let full = vec![
        start_sentinel(),
        utterance("A", "one"),
        utterance("B", "two"),
        end_sentinel(),
    ];
    for upto in 1..=full.len() {
        c.apply_snapshot(full[..upto].to_vec());
        if observed.last() != Some(&c.state()) {
            observed.push(c.state());
        }
    }
    assert_eq!(
        observed,
        vec![
            SessionState::Configuring,
            SessionState::Presenting,
            SessionState::Ended,
        ]
    );
}

// ---------------------------------------------------------------------------
// Guarded actions (rejected before any request is sent)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_start_rejected_outside_configuring() {
    let mut c = controller(RoomRole::Exec, true);
    // Not mounted: still Idle.
    let selection = panelflow::StartDiscussionRequest {
        room_id: 1,
        agenda_id: 0,
        agenda_text: "t".to_string(),
        config_id: 1,
        config_file: "c_ja.yml".to_string(),
        lang: "ja".to_string(),
        tech_enable: false,
        is_select_agenda: false,
    };
    assert!(matches!(
        c.start(selection).await,
        Err(PanelflowError::Rejected(_))
    ));
    assert_eq!(c.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_request_next_rejected_without_advance() {
    let c = controller(RoomRole::Exec, true);
    assert!(matches!(
        c.request_next().await,
        Err(PanelflowError::Rejected(_))
    ));
}

#[tokio::test]
async fn test_intervene_rejected_while_configuring() {
    let mut c = controller(RoomRole::Exec, true);
    c.mount();
    assert!(matches!(
        c.intervene("user", "hello").await,
        Err(PanelflowError::Rejected(_))
    ));
    assert_eq!(c.state(), SessionState::Configuring);
}

// ---------------------------------------------------------------------------
// Restart / teardown / polling
// ---------------------------------------------------------------------------

#[test]
fn test_restart_only_from_ended() {
    let mut c = controller(RoomRole::Exec, true);
    c.mount();
    assert!(c.restart().is_err());
    c.apply_snapshot(vec![start_sentinel(), utterance("A", "hi"), end_sentinel()]);
    assert!(c.restart().is_ok());
    assert_eq!(c.state(), SessionState::Configuring);
}

#[test]
fn test_restart_rejected_without_support() {
    let mut c = controller(RoomRole::View, false);
    c.mount();
    c.apply_snapshot(vec![start_sentinel(), utterance("A", "hi"), end_sentinel()]);
    assert!(c.restart().is_err());
}

#[test]
fn test_teardown_marks_not_running() {
    let (mut c, status) = controller_with_status(RoomRole::Exec, true);
    c.mount();
    c.apply_snapshot(vec![start_sentinel(), utterance("A", "hi")]);
    assert!(status.lock().unwrap().is_running);
    c.teardown();
    assert!(!status.lock().unwrap().is_running);
    assert!(!c.advance_enabled());
    assert!(!c.input_enabled());
}

#[test]
fn test_poll_interval_slows_when_cached() {
    let (c, status) = controller_with_status(RoomRole::View, false);
    assert_eq!(c.poll_interval(), Duration::from_millis(1000));
    status.lock().unwrap().uses_cache = true;
    assert_eq!(c.poll_interval(), Duration::from_millis(3000));
}
