use tokio::sync::broadcast;
use tracing::{debug, info};

use encore_core::events::EngineEvent;

/// In-process fan-out of engine events. The waitlist promoter subscribes
/// internally; external layers (cache invalidation, notifications,
/// analytics) subscribe the same way.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Publish never fails the caller: a seat release with no subscribers
    /// is simply dropped (the seat stays available for ordinary booking).
    pub fn publish(&self, event: EngineEvent) {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        match self.tx.send(event) {
            Ok(receivers) => info!("Published event to {} subscriber(s): {}", receivers, payload),
            Err(_) => debug!("No subscribers for event: {}", payload),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(128)
    }
}
