//! Event Bus - distribution of gateway events
//!
//! Every worker holds an [`EventSender`]; any number of consumers subscribe
//! and receive every event emitted after subscription.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                Event Bus (broadcast channel)              │
//! │                                                           │
//! │  Producers:                 Consumers:                    │
//! │  ├─ WorkerPool              ├─ audit / access logging     │
//! │  ├─ ConnectionGateway       ├─ health probes              │
//! │  └─ EndpointRegistry        └─ integration tests          │
//! └───────────────────────────────────────────────────────────┘
//! ```

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::GatewayEvent;

/// Default channel capacity for the event bus
const DEFAULT_CAPACITY: usize = 1024;

/// Central hub for gateway event distribution
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GatewayEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Get a sender for emitting events
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// Subscribe to all events emitted from now on
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Used by workers to emit gateway events
///
/// Cheaply cloneable; emitting never fails.
#[derive(Clone)]
pub struct EventSender {
    sender: broadcast::Sender<GatewayEvent>,
}

impl EventSender {
    /// Sender with no bus behind it; every event is dropped
    pub fn disconnected() -> Self {
        EventBus::with_capacity(1).sender()
    }

    /// Emit an event, returning the number of receivers that got it
    pub fn emit(&self, event: GatewayEvent) -> usize {
        let type_name = event.type_name();
        match self.sender.send(event) {
            Ok(count) => {
                debug!(event_type = type_name, receivers = count, "[EventBus] Emitted event");
                count
            }
            // No receivers - nobody is listening, not an error
            Err(_) => 0,
        }
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Used by consumers to receive gateway events
pub struct EventReceiver {
    receiver: broadcast::Receiver<GatewayEvent>,
}

impl EventReceiver {
    /// Receive the next event, `None` once every sender is gone
    ///
    /// Lag is logged and skipped rather than surfaced.
    pub async fn recv(&mut self) -> Option<GatewayEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        skipped_events = skipped,
                        "[EventBus] Receiver lagged, skipped {} events", skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("[EventBus] Channel closed");
                    return None;
                }
            }
        }
    }

    /// Receive an event without waiting
    pub fn try_recv(&mut self) -> Option<GatewayEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                warn!(skipped_events = skipped, "[EventBus] Receiver lagged on try_recv");
                self.receiver.try_recv().ok()
            }
            Err(_) => None,
        }
    }

    /// Drain everything that is currently buffered
    pub fn drain(&mut self) -> Vec<GatewayEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}
