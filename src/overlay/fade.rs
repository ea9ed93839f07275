//! Overlay fade-in

use std::time::{Duration, Instant};

/// Linear opacity ramp from 0 to 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeIn {
    start: Instant,
    duration: Duration,
    complete: bool,
}

impl FadeIn {
    pub fn new(start: Instant, duration: Duration) -> Self {
        Self {
            start,
            duration,
            complete: duration.is_zero(),
        }
    }

    /// Opacity at `now`, clamped to 0.0..=1.0
    pub fn opacity_at(&self, now: Instant) -> f32 {
        if self.complete {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.start);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    /// Advance to `now`; returns the new opacity, or `None` once the ramp has finished
    pub fn advance(&mut self, now: Instant) -> Option<f32> {
        if self.complete {
            return None;
        }
        let opacity = self.opacity_at(now);
        if opacity >= 1.0 {
            self.complete = true;
        }
        Some(opacity)
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }
}
