//! Restart cooldown
//!
//! Armed when an interruption triggers a restart. While armed, further
//! restart requests are suppressed. The controller disarms it from a timer
//! task, so nothing ever blocks waiting for the window to pass.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RestartCooldown {
    window: Duration,
    /// Epoch of the currently armed window
    armed: Option<u64>,
    next_epoch: u64,
}

impl RestartCooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            armed: None,
            next_epoch: 0,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_active(&self) -> bool {
        self.armed.is_some()
    }

    /// Arm a new window, returning its epoch; `None` if one is already armed
    pub fn try_arm(&mut self) -> Option<u64> {
        if self.armed.is_some() {
            return None;
        }
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        self.armed = Some(epoch);
        Some(epoch)
    }

    /// Disarm the window armed under `epoch`; timers from older windows are ignored
    pub fn expire(&mut self, epoch: u64) -> bool {
        if self.armed == Some(epoch) {
            self.armed = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_suppresses_until_expired() {
        let mut cooldown = RestartCooldown::new(Duration::from_secs(5));
        let epoch = cooldown.try_arm().unwrap();
        assert!(cooldown.is_active());
        assert!(cooldown.try_arm().is_none());
        assert!(cooldown.expire(epoch));
        assert!(!cooldown.is_active());
        assert!(cooldown.try_arm().is_some());
    }

    #[test]
    fn test_stale_epoch_ignored() {
        let mut cooldown = RestartCooldown::new(Duration::from_secs(5));
        let first = cooldown.try_arm().unwrap();
        cooldown.expire(first);
        let second = cooldown.try_arm().unwrap();
        assert!(!cooldown.expire(first));
        assert!(cooldown.is_active());
        assert!(cooldown.expire(second));
    }
}
