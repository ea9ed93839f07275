//! Host method channel
//!
//! Outbound events are fanned out to every subscriber over a broadcast
//! channel. Inbound commands are parsed here and executed by the controller.

mod commands;
mod events;

pub use commands::{CommandError, CommandResponse, HostCommand};
pub use events::HostEvent;

use tokio::sync::broadcast;

/// Method channel name registered with the host
pub const CHANNEL_NAME: &str = "plugins.miquido.com/ar_quido";

/// Capacity for 64 pending events per subscriber
const EVENT_CAPACITY: usize = 64;

/// Sender side of the host event channel
#[derive(Debug, Clone)]
pub struct EventBridge {
    tx: broadcast::Sender<HostEvent>,
}

impl EventBridge {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Send an event to every current subscriber
    ///
    /// Events emitted while nobody listens are dropped.
    pub fn emit(&self, event: HostEvent) {
        tracing::debug!(event = event.method_name(), image = ?event.image_name(), "Host event");
        if self.tx.send(event).is_err() {
            tracing::trace!("No host listener attached");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new()
    }
}
