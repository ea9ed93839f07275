//! Tracking session manager
//!
//! Sole writer of [`SessionState`]. A reset is split in two: `begin_reset`
//! claims the configuring state and hands out a ticket, the configuration is
//! built in the background, and `finish_reset` applies it if the ticket is
//! still current. Anything that happens in between (pause, failure,
//! teardown) bumps the generation and turns the pending ticket stale.

use std::time::Duration;

use super::cooldown::RestartCooldown;
use super::state::{RecognitionEvent, ResetReason, SessionState};
use crate::platform::{ArSession, PlatformError, RunOptions, SessionConfiguration};

/// Claim on a pending configuration pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetTicket {
    generation: u64,
    reason: ResetReason,
}

impl ResetTicket {
    pub fn reason(&self) -> ResetReason {
        self.reason
    }
}

/// Result of applying a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The ticket was superseded; nothing was applied
    Stale,
    /// The session is running with the new configuration
    Applied(Option<RecognitionEvent>),
}

/// What an interruption led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptionOutcome {
    /// Restart scheduled; the cooldown armed under `cooldown_epoch` must be expired by a timer
    Restart {
        ticket: ResetTicket,
        cooldown_epoch: u64,
    },
    /// Within the cooldown window or already reconfiguring
    Suppressed,
    /// The session is not running
    Ignored,
}

pub struct TrackingSessionManager {
    session: Box<dyn ArSession>,
    state: SessionState,
    /// Bumped whenever a pending configuration must be discarded
    generation: u64,
    max_tracked_images: usize,
    cooldown: RestartCooldown,
    /// `recognitionStarted` has been emitted
    has_started: bool,
    /// Paused since the last announcement; the next applied reset resumes
    resume_pending: bool,
}

impl TrackingSessionManager {
    pub fn new(session: Box<dyn ArSession>, max_tracked_images: usize, cooldown: Duration) -> Self {
        Self {
            session,
            state: SessionState::Idle,
            generation: 0,
            max_tracked_images,
            cooldown: RestartCooldown::new(cooldown),
            has_started: false,
            resume_pending: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn max_tracked_images(&self) -> usize {
        self.max_tracked_images
    }

    pub fn cooldown_window(&self) -> Duration {
        self.cooldown.window()
    }

    pub fn is_cooling_down(&self) -> bool {
        self.cooldown.is_active()
    }

    /// Claim the configuring state
    ///
    /// Returns `None` while a configuration is already in flight; such calls
    /// are no-ops.
    pub fn begin_reset(&mut self, reason: ResetReason) -> Option<ResetTicket> {
        if self.state.is_configuring() {
            tracing::debug!(state = %self.state, "Reset ignored, configuration already in progress");
            return None;
        }

        self.generation += 1;
        self.state = match reason {
            ResetReason::Requested => SessionState::Configuring,
            ResetReason::Interruption => SessionState::Restarting,
        };
        tracing::info!(state = %self.state, generation = self.generation, "Reset started");

        Some(ResetTicket {
            generation: self.generation,
            reason,
        })
    }

    /// Run the session with a configuration built for `ticket`
    ///
    /// On failure the session is left idle and the error is returned for the
    /// caller to surface; nothing is retried automatically.
    pub fn finish_reset(
        &mut self,
        ticket: ResetTicket,
        configuration: &SessionConfiguration,
    ) -> Result<ResetOutcome, PlatformError> {
        if ticket.generation != self.generation || !self.state.is_configuring() {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                state = %self.state,
                "Discarding stale configuration"
            );
            return Ok(ResetOutcome::Stale);
        }

        if let Err(e) = self.session.run(configuration, RunOptions::RESET) {
            tracing::error!("Failed to run tracking session: {}", e);
            self.state = SessionState::Idle;
            self.generation += 1;
            return Err(e);
        }

        self.state = SessionState::Running;
        let event = if !self.has_started {
            self.has_started = true;
            Some(RecognitionEvent::Started)
        } else if self.resume_pending {
            self.resume_pending = false;
            Some(RecognitionEvent::Resumed)
        } else {
            None
        };

        tracing::info!(
            markers = configuration.detection_images.len(),
            reason = ?ticket.reason,
            "Tracking session running"
        );
        Ok(ResetOutcome::Applied(event))
    }

    /// Stop the session
    ///
    /// Emits `Paused` only once recognition has been announced to the host.
    pub fn pause(&mut self) -> Option<RecognitionEvent> {
        if self.state == SessionState::Idle {
            return None;
        }

        self.session.pause();
        self.state = SessionState::Idle;
        self.generation += 1;
        tracing::info!("Tracking session paused");

        if self.has_started {
            self.resume_pending = true;
            Some(RecognitionEvent::Paused)
        } else {
            None
        }
    }

    /// React to the platform interrupting a running session
    pub fn handle_interruption(&mut self) -> InterruptionOutcome {
        match self.state {
            SessionState::Idle => {
                tracing::debug!("Interruption while idle, ignoring");
                return InterruptionOutcome::Ignored;
            }
            SessionState::Configuring | SessionState::Restarting => {
                tracing::debug!(state = %self.state, "Interruption during configuration, suppressed");
                return InterruptionOutcome::Suppressed;
            }
            SessionState::Running => {}
        }

        let Some(cooldown_epoch) = self.cooldown.try_arm() else {
            tracing::info!(
                window_ms = self.cooldown.window().as_millis() as u64,
                "Restart suppressed during cooldown"
            );
            return InterruptionOutcome::Suppressed;
        };

        match self.begin_reset(ResetReason::Interruption) {
            Some(ticket) => InterruptionOutcome::Restart {
                ticket,
                cooldown_epoch,
            },
            None => {
                self.cooldown.expire(cooldown_epoch);
                InterruptionOutcome::Suppressed
            }
        }
    }

    /// Timer callback for the restart cooldown
    pub fn cooldown_elapsed(&mut self, epoch: u64) {
        if self.cooldown.expire(epoch) {
            tracing::debug!(epoch, "Restart cooldown elapsed");
        }
    }

    /// The platform reported the session failed
    pub fn handle_failure(&mut self, error: &PlatformError) {
        tracing::error!(state = %self.state, "Tracking session failed: {}", error);
        self.state = SessionState::Idle;
        self.generation += 1;
    }

    /// Stop everything; the manager is not used afterwards
    pub fn teardown(&mut self) {
        if self.state != SessionState::Idle {
            self.session.pause();
        }
        self.state = SessionState::Idle;
        self.generation += 1;
        tracing::info!("Tracking session torn down");
    }
}
