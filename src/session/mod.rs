//! Tracking session lifecycle
//!
//! Owns the session configuration, drives resets and interruption restarts,
//! and decides which recognition events the host sees.

mod configure;
mod cooldown;
mod manager;
mod state;

pub use configure::{build_configuration, ConfigurationReport};
pub use cooldown::RestartCooldown;
pub use manager::{InterruptionOutcome, ResetOutcome, ResetTicket, TrackingSessionManager};
pub use state::{RecognitionEvent, ResetReason, SessionState};
