//! Session state machine values

use serde::{Deserialize, Serialize};

/// Lifecycle state of the tracking session
///
/// `Idle → Configuring → Running`, `Running → Restarting → Running` on
/// interruption, and any state back to `Idle` on pause or teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Idle,
    Configuring,
    Running,
    Restarting,
}

impl SessionState {
    /// A configuration is being built and not yet applied
    pub fn is_configuring(self) -> bool {
        matches!(self, SessionState::Configuring | SessionState::Restarting)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Configuring => write!(f, "configuring"),
            SessionState::Running => write!(f, "running"),
            SessionState::Restarting => write!(f, "restarting"),
        }
    }
}

/// Recognition lifecycle transitions reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionEvent {
    Started,
    Paused,
    Resumed,
}

/// Why a configuration pass was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// Host asked for recognition to start or reset
    Requested,
    /// Automatic restart after a session interruption
    Interruption,
}
