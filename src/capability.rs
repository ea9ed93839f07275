//! Device capability handles
//!
//! Side effects on the device that must be undone when the recognition view
//! goes away. Each handle restores the device on release and on drop.

use crate::platform::{DisplayControl, PlatformError, Torch};

/// Keeps the display awake while recognition is active
pub struct IdleTimerLock {
    display: Box<dyn DisplayControl>,
    held: bool,
}

impl IdleTimerLock {
    pub fn new(display: Box<dyn DisplayControl>) -> Self {
        Self {
            display,
            held: false,
        }
    }

    /// Disable the idle timer; repeated calls are no-ops
    pub fn acquire(&mut self) {
        if !self.held {
            self.display.set_idle_timer_disabled(true);
            self.held = true;
            tracing::debug!("Idle timer disabled");
        }
    }

    /// Restore the idle timer
    pub fn release(&mut self) {
        if self.held {
            self.display.set_idle_timer_disabled(false);
            self.held = false;
            tracing::debug!("Idle timer restored");
        }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

impl Drop for IdleTimerLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Torch switch that is turned off when released
pub struct TorchControl {
    torch: Box<dyn Torch>,
    on: bool,
}

impl TorchControl {
    pub fn new(torch: Box<dyn Torch>) -> Self {
        Self { torch, on: false }
    }

    pub fn set(&mut self, on: bool) -> Result<(), PlatformError> {
        self.torch.set_torch(on)?;
        self.on = on;
        tracing::info!(on, "Torch toggled");
        Ok(())
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Switch the torch off if it is on
    pub fn release(&mut self) {
        if !self.on {
            return;
        }
        match self.torch.set_torch(false) {
            Ok(()) => self.on = false,
            Err(e) => tracing::warn!("Failed to switch torch off: {}", e),
        }
    }
}

impl Drop for TorchControl {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::simulated::{SimulatedDisplay, SimulatedTorch};

    #[test]
    fn test_idle_timer_lock() {
        let display = SimulatedDisplay::default();
        let mut lock = IdleTimerLock::new(Box::new(display.clone()));
        lock.acquire();
        assert!(display.idle_timer_disabled());
        lock.release();
        assert!(!display.idle_timer_disabled());

        lock.acquire();
        drop(lock);
        assert!(!display.idle_timer_disabled());
    }

    #[test]
    fn test_torch_off_on_drop() {
        let torch = SimulatedTorch::default();
        let mut control = TorchControl::new(Box::new(torch.clone()));
        control.set(true).unwrap();
        assert!(torch.is_on());
        drop(control);
        assert!(!torch.is_on());
    }

    #[test]
    fn test_torch_unavailable() {
        let torch = SimulatedTorch::default();
        torch.set_unavailable();
        let mut control = TorchControl::new(Box::new(torch));
        assert!(matches!(control.set(true), Err(PlatformError::Torch(_))));
        assert!(!control.is_on());
    }
}
