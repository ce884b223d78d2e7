//! Tests for exclusivity arbitration — the duplicate-executor rule fires in
//! any controller state and always resolves to a viewer redirect.

use panelflow::arbiter::DUPLICATE_EXECUTOR_NOTICE;
use panelflow::message::{Message, WireType, LIFECYCLE_START_TEXT};
use panelflow::{
    new_shared_status, ApiClient, ClientConfig, DisconnectReason, DiscussionSessionController,
    ExclusivityArbiter, ExclusivityVerdict, RoomRole, SharedStatus,
};

fn exec_controller() -> (DiscussionSessionController, SharedStatus) {
    let config = ClientConfig::default();
    let api = ApiClient::new(&config).unwrap();
    let status = new_shared_status();
    (
        DiscussionSessionController::new(
            api,
            7,
            RoomRole::Exec,
            status.clone(),
            config.timing(),
            true,
        ),
        status,
    )
}

fn start_sentinel() -> Message {
    Message {
        msg_type: Some(WireType::SystemInfo),
        user_name: Some("system".to_string()),
        msg_text: Some(LIFECYCLE_START_TEXT.to_string()),
        timestamp: None,
        time: None,
        user_img: None,
        handover_datum: None,
    }
}

#[test]
fn test_duplicate_executor_verdict_is_evict_to_viewer() {
    let verdict = ExclusivityArbiter::judge(&DisconnectReason::DuplicateExecutor);
    assert_eq!(
        verdict,
        ExclusivityVerdict::Evict {
            notice: DUPLICATE_EXECUTOR_NOTICE,
            rejoin_as: RoomRole::View,
        }
    );
}

#[test]
fn test_transport_close_is_ignored() {
    let reason = DisconnectReason::Other("keepalive lost".to_string());
    assert_eq!(
        ExclusivityArbiter::judge(&reason),
        ExclusivityVerdict::Ignore(reason)
    );
}

#[test]
fn test_eviction_preempts_running_session() {
    let (mut controller, status) = exec_controller();
    controller.mount();
    controller.apply_snapshot(vec![start_sentinel()]);
    assert!(status.lock().unwrap().is_running);

    let verdict = ExclusivityArbiter::judge_and_preempt(
        &DisconnectReason::DuplicateExecutor,
        &mut controller,
    );
    assert!(matches!(verdict, ExclusivityVerdict::Evict { .. }));
    assert!(!status.lock().unwrap().is_running);
    assert!(!controller.advance_enabled());
    assert!(!controller.input_enabled());
}

#[test]
fn test_eviction_fires_before_any_round() {
    // Regardless of lifecycle state: even a freshly mounted controller is
    // pre-empted.
    let (mut controller, status) = exec_controller();
    controller.mount();
    let verdict = ExclusivityArbiter::judge_and_preempt(
        &DisconnectReason::DuplicateExecutor,
        &mut controller,
    );
    assert!(matches!(verdict, ExclusivityVerdict::Evict { .. }));
    assert!(!status.lock().unwrap().is_running);
}

#[test]
fn test_ordinary_close_does_not_preempt() {
    let (mut controller, status) = exec_controller();
    controller.mount();
    controller.apply_snapshot(vec![start_sentinel()]);
    let verdict = ExclusivityArbiter::judge_and_preempt(
        &DisconnectReason::Other("server restart".to_string()),
        &mut controller,
    );
    assert!(matches!(verdict, ExclusivityVerdict::Ignore(_)));
    assert!(status.lock().unwrap().is_running);
}
