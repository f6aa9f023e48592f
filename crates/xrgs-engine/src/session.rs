use tracing::{debug, error, info, warn};

use xrgs_protocol::xr::{RuntimeEvent, SessionId, SessionState, ViewConfigurationType};

use crate::error::SessionError;
use crate::runtime::XrRuntime;

/// Tracks the session lifecycle from runtime-pushed events.
///
/// State changes only through [`SessionStateMachine::handle_event`]; nothing
/// here moves the session on local intent. `session_running` and
/// `application_running` follow from the events observed so far.
#[derive(Debug)]
pub struct SessionStateMachine {
    session: SessionId,
    view_configuration: ViewConfigurationType,
    state: SessionState,
    session_running: bool,
    application_running: bool,
}

impl SessionStateMachine {
    pub fn new(session: SessionId, view_configuration: ViewConfigurationType) -> Self {
        Self {
            session,
            view_configuration,
            state: SessionState::Unknown,
            session_running: false,
            application_running: true,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn is_session_running(&self) -> bool {
        self.session_running
    }

    pub fn is_application_running(&self) -> bool {
        self.application_running
    }

    /// Whether a frame may be rendered: the session is in a render-capable
    /// state and the runtime asked for this frame.
    pub fn is_render_eligible(&self, should_render: bool) -> bool {
        self.state.is_render_capable() && should_render
    }

    /// Drain the runtime's event queue. Returns the number of events handled.
    pub fn poll_events<R: XrRuntime>(&mut self, runtime: &mut R) -> Result<usize, SessionError> {
        let mut handled = 0;
        while let Some(event) = runtime.poll_event().map_err(SessionError::Poll)? {
            self.handle_event(runtime, &event)?;
            handled += 1;
        }
        Ok(handled)
    }

    pub fn handle_event<R: XrRuntime>(
        &mut self,
        runtime: &mut R,
        event: &RuntimeEvent,
    ) -> Result<(), SessionError> {
        match *event {
            RuntimeEvent::SessionStateChanged {
                session,
                state,
                time,
            } => {
                if session != self.session {
                    warn!(
                        "ignoring state change to {} for stale session {:?}",
                        state, session
                    );
                    return Ok(());
                }
                info!(
                    "session state {} -> {} (time={})",
                    self.state,
                    state,
                    time.as_nanos()
                );
                self.on_state_changed(runtime, state)
            }
            RuntimeEvent::InstanceLossPending { loss_time } => {
                warn!("instance loss pending at {}", loss_time.as_nanos());
                self.session_running = false;
                self.application_running = false;
                Ok(())
            }
            RuntimeEvent::EventsLost { count } => {
                warn!("runtime dropped {} events", count);
                Ok(())
            }
            RuntimeEvent::ReferenceSpaceChangePending {
                session,
                space_type,
            } => {
                if session == self.session {
                    info!("reference space {:?} change pending", space_type);
                } else {
                    warn!("ignoring reference space change for stale session {:?}", session);
                }
                Ok(())
            }
            RuntimeEvent::InteractionProfileChanged { session } => {
                if session == self.session {
                    debug!("interaction profile changed");
                } else {
                    warn!("ignoring interaction profile change for stale session {:?}", session);
                }
                Ok(())
            }
        }
    }

    fn on_state_changed<R: XrRuntime>(
        &mut self,
        runtime: &mut R,
        state: SessionState,
    ) -> Result<(), SessionError> {
        match state {
            SessionState::Ready => {
                self.state = SessionState::Ready;
                runtime.begin_session(self.view_configuration).map_err(|e| {
                    error!("session begin failed: {}", e);
                    SessionError::BeginFailed(e)
                })?;
                self.session_running = true;
                info!("session running");
            }
            SessionState::Stopping => {
                self.state = SessionState::Stopping;
                if let Err(e) = runtime.end_session() {
                    error!("session end failed: {}", e);
                }
                self.session_running = false;
                info!("session stopped");
            }
            SessionState::Exiting | SessionState::LossPending => {
                self.state = state;
                self.session_running = false;
                self.application_running = false;
            }
            SessionState::Synchronized | SessionState::Visible | SessionState::Focused => {
                if !self.session_running {
                    warn!("ignoring {} while the session is not running", state);
                    return Ok(());
                }
                self.state = state;
            }
            SessionState::Unknown | SessionState::Idle => {
                self.state = state;
            }
        }
        Ok(())
    }

    /// Ask the runtime to wind the session down. The state machine only
    /// moves once the resulting Stopping and Exiting events arrive.
    pub fn request_exit<R: XrRuntime>(&self, runtime: &mut R) {
        if !self.session_running {
            return;
        }
        if let Err(e) = runtime.request_exit_session() {
            error!("request exit failed: {}", e);
        }
    }
}
