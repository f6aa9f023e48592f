//! Integration test: SessionStateMachine
//!
//! Feeds scripted runtime events through the state machine and checks the
//! derived running flags, begin/end calls and stale-session filtering.

mod common;

use common::{count, new_log, state_event, MockRuntime, SESSION};
use xrgs_engine::error::SessionError;
use xrgs_engine::session::SessionStateMachine;
use xrgs_protocol::xr::{
    ReferenceSpaceType, RuntimeEvent, SessionId, SessionState, Time, ViewConfigurationType,
};

fn machine() -> SessionStateMachine {
    SessionStateMachine::new(SESSION, ViewConfigurationType::PrimaryStereo)
}

#[test]
fn test_initial_state() {
    let session = machine();
    assert_eq!(session.state(), SessionState::Unknown);
    assert!(!session.is_session_running());
    assert!(session.is_application_running());
    assert!(!session.is_render_eligible(true));
}

#[test]
fn test_ready_begins_session() {
    let log = new_log();
    let mut runtime = MockRuntime::new(log.clone());
    let mut session = machine();

    runtime.push_state(SessionState::Idle);
    runtime.push_state(SessionState::Ready);
    let handled = session.poll_events(&mut runtime).unwrap();

    assert_eq!(handled, 2);
    assert_eq!(count(&log, "begin_session"), 1);
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.is_session_running());
    // Ready is not a render-capable state
    assert!(!session.is_render_eligible(true));
}

#[test]
fn test_render_states_need_running_session() {
    let log = new_log();
    let mut runtime = MockRuntime::new(log.clone());
    let mut session = machine();

    // Focused before Ready is ignored
    runtime.push_state(SessionState::Focused);
    session.poll_events(&mut runtime).unwrap();
    assert_eq!(session.state(), SessionState::Unknown);
    assert!(!session.is_render_eligible(true));

    runtime.push_state(SessionState::Ready);
    runtime.push_state(SessionState::Synchronized);
    runtime.push_state(SessionState::Visible);
    runtime.push_state(SessionState::Focused);
    session.poll_events(&mut runtime).unwrap();

    assert_eq!(session.state(), SessionState::Focused);
    assert!(session.is_render_eligible(true));
    // The runtime's per-frame flag still gates rendering
    assert!(!session.is_render_eligible(false));
}

#[test]
fn test_begin_failure_is_reported() {
    let log = new_log();
    let mut runtime = MockRuntime::new(log.clone());
    runtime.fail_begin_session = true;
    let mut session = machine();

    runtime.push_state(SessionState::Ready);
    match session.poll_events(&mut runtime) {
        Err(SessionError::BeginFailed(_)) => {}
        other => panic!("expected BeginFailed, got {:?}", other),
    }
    assert!(!session.is_session_running());

    // Nothing reaches a render state without a successful begin
    runtime.push_state(SessionState::Synchronized);
    session.poll_events(&mut runtime).unwrap();
    assert_ne!(session.state(), SessionState::Synchronized);
}

#[test]
fn test_stopping_ends_session() {
    let log = new_log();
    let mut runtime = MockRuntime::new(log.clone());
    let mut session = machine();

    runtime.push_state(SessionState::Ready);
    runtime.push_state(SessionState::Focused);
    runtime.push_state(SessionState::Stopping);
    session.poll_events(&mut runtime).unwrap();

    assert_eq!(count(&log, "end_session"), 1);
    assert_eq!(session.state(), SessionState::Stopping);
    assert!(!session.is_session_running());
    assert!(session.is_application_running());
}

#[test]
fn test_loss_pending_while_focused_stops_everything() {
    let log = new_log();
    let mut runtime = MockRuntime::new(log.clone());
    let mut session = machine();

    runtime.push_state(SessionState::Ready);
    runtime.push_state(SessionState::Focused);
    session.poll_events(&mut runtime).unwrap();
    assert!(session.is_render_eligible(true));

    runtime.push_state(SessionState::LossPending);
    session.poll_events(&mut runtime).unwrap();

    assert_eq!(session.state(), SessionState::LossPending);
    assert!(!session.is_session_running());
    assert!(!session.is_application_running());
    assert!(!session.is_render_eligible(true));
}

#[test]
fn test_exiting_stops_application() {
    let log = new_log();
    let mut runtime = MockRuntime::new(log.clone());
    let mut session = machine();

    runtime.push_state(SessionState::Ready);
    runtime.push_state(SessionState::Stopping);
    runtime.push_state(SessionState::Exiting);
    session.poll_events(&mut runtime).unwrap();

    assert_eq!(session.state(), SessionState::Exiting);
    assert!(!session.is_application_running());
}

#[test]
fn test_instance_loss_pending_stops_everything() {
    let log = new_log();
    let mut runtime = MockRuntime::new(log.clone());
    let mut session = machine();

    runtime.push_state(SessionState::Ready);
    runtime.events.push_back(RuntimeEvent::InstanceLossPending { loss_time: Time(42) });
    session.poll_events(&mut runtime).unwrap();

    assert!(!session.is_session_running());
    assert!(!session.is_application_running());
}

#[test]
fn test_stale_session_events_ignored() {
    let log = new_log();
    let mut runtime = MockRuntime::new(log.clone());
    let mut session = machine();
    let stale = SessionId(99);

    runtime.events.push_back(state_event(stale, SessionState::Ready));
    runtime.events.push_back(state_event(stale, SessionState::Exiting));
    runtime.events.push_back(RuntimeEvent::ReferenceSpaceChangePending {
        session: stale,
        space_type: ReferenceSpaceType::Local,
    });
    let handled = session.poll_events(&mut runtime).unwrap();

    assert_eq!(handled, 3);
    assert_eq!(count(&log, "begin_session"), 0);
    assert_eq!(session.state(), SessionState::Unknown);
    assert!(session.is_application_running());
}

#[test]
fn test_informational_events_do_not_change_state() {
    let log = new_log();
    let mut runtime = MockRuntime::new(log.clone());
    let mut session = machine();

    runtime.events.push_back(RuntimeEvent::EventsLost { count: 3 });
    runtime.events.push_back(RuntimeEvent::InteractionProfileChanged { session: SESSION });
    runtime.events.push_back(RuntimeEvent::ReferenceSpaceChangePending {
        session: SESSION,
        space_type: ReferenceSpaceType::Stage,
    });
    session.poll_events(&mut runtime).unwrap();

    assert_eq!(session.state(), SessionState::Unknown);
    assert!(!session.is_session_running());
    assert!(session.is_application_running());
}

#[test]
fn test_request_exit_only_when_running() {
    let log = new_log();
    let mut runtime = MockRuntime::new(log.clone());
    let mut session = machine();

    session.request_exit(&mut runtime);
    assert_eq!(count(&log, "request_exit_session"), 0);

    runtime.push_state(SessionState::Ready);
    session.poll_events(&mut runtime).unwrap();
    session.request_exit(&mut runtime);
    assert_eq!(count(&log, "request_exit_session"), 1);
    // State moves only once the runtime's events arrive
    assert!(session.is_session_running());

    session.poll_events(&mut runtime).unwrap();
    assert_eq!(session.state(), SessionState::Exiting);
    assert!(!session.is_application_running());
}
