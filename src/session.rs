use tracing::debug;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    #[default]
    Uninitialized,
    SessionStarting,
    SessionRunning,
    SessionPaused,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot {action} while the session is {from:?}")]
pub struct SessionError {
    pub action: &'static str,
    pub from: SessionState,
}

/// Lifecycle of the AR session, driven explicitly instead of by frame
/// callbacks.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::SessionRunning
    }

    pub fn initialize(&mut self) -> Result<(), SessionError> {
        self.transition("initialize", SessionState::Uninitialized, SessionState::SessionStarting)
    }

    /// The runtime reported that the session started running.
    pub fn on_ran(&mut self) -> Result<(), SessionError> {
        self.transition("run", SessionState::SessionStarting, SessionState::SessionRunning)
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.transition("pause", SessionState::SessionRunning, SessionState::SessionPaused)
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        self.transition("resume", SessionState::SessionPaused, SessionState::SessionRunning)
    }

    pub fn shutdown(&mut self) {
        debug!(from = ?self.state, "session shut down");
        self.state = SessionState::Uninitialized;
    }

    fn transition(
        &mut self,
        action: &'static str,
        from: SessionState,
        to: SessionState,
    ) -> Result<(), SessionError> {
        if self.state != from {
            return Err(SessionError {
                action,
                from: self.state,
            });
        }

        debug!(?from, ?to, "session transition");
        self.state = to;

        Ok(())
    }
}
