//! Event emitter port.
//!
//! Implementations handle transport details (channels, logs, UI bridges).

use tokio::sync::broadcast;

use crate::events::RuntimeEvent;

/// Trait for emitting runtime events.
///
/// # Implementations
///
/// - `NoopEmitter` - For tests and CLI contexts that don't need events
/// - `ChannelEmitter` - Fan-out to any number of subscribers
pub trait EventEmitter: Send + Sync {
    /// Emit an event. Must not block.
    fn emit(&self, event: RuntimeEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn EventEmitter>;
}

/// Discards every event.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub const fn new() -> Self {
        Self
    }
}

impl EventEmitter for NoopEmitter {
    fn emit(&self, _event: RuntimeEvent) {}

    fn clone_box(&self) -> Box<dyn EventEmitter> {
        Box::new(self.clone())
    }
}

/// Broadcast-channel emitter.
///
/// Slow subscribers may miss events once the buffer overflows; emitting
/// with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    sender: broadcast::Sender<RuntimeEvent>,
}

impl ChannelEmitter {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create an emitter with default capacity (256 events).
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(256)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.sender.subscribe()
    }
}

impl EventEmitter for ChannelEmitter {
    fn emit(&self, event: RuntimeEvent) {
        let _ = self.sender.send(event);
    }

    fn clone_box(&self) -> Box<dyn EventEmitter> {
        Box::new(self.clone())
    }
}
