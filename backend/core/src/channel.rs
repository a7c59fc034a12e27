use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::event::Event;
use crate::traits::EventPort;

/// Default channel buffer size for event subscribers.
const DEFAULT_BUFFER_SIZE: usize = 256;

/// Broadcast bus for engine events.
///
/// Built on a Tokio broadcast channel: slow subscribers lag and lose events
/// rather than applying backpressure to the engine.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the default buffer size.
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new bus with a custom buffer size.
    pub fn with_buffer_size(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        info!(buffer_size = buffer, "EventBus initialized");
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        debug!("EventBus subscriber added");
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPort for EventBus {
    fn emit(&self, event: Event) {
        // No receivers is fine.
        let _ = self.tx.send(event);
    }
}

/// Delivers every event to each wrapped port in order.
#[derive(Clone, Default)]
pub struct FanOut {
    ports: Vec<Arc<dyn EventPort>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, port: Arc<dyn EventPort>) -> Self {
        self.ports.push(port);
        self
    }
}

impl EventPort for FanOut {
    fn emit(&self, event: Event) {
        for port in &self.ports {
            port.emit(event.clone());
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPort;

impl EventPort for NullPort {
    fn emit(&self, _event: Event) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[tokio::test]
    async fn test_bus_delivers_to_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(Event::new(None, EventKind::AgentPaused));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, EventKind::AgentPaused);
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::with_buffer_size(4);
        bus.emit(Event::new(None, EventKind::AgentResumed));
    }

    #[tokio::test]
    async fn test_fan_out_reaches_every_port() {
        let a = EventBus::new();
        let b = EventBus::new();
        let mut rx_a = a.subscribe();
        let mut rx_b = b.subscribe();

        let fan = FanOut::new()
            .with(Arc::new(a.clone()))
            .with(Arc::new(NullPort))
            .with(Arc::new(b.clone()));
        fan.emit(Event::new(Some("s".into()), EventKind::AgentResumed));

        assert_eq!(rx_a.recv().await.unwrap().kind, EventKind::AgentResumed);
        assert_eq!(rx_b.recv().await.unwrap().kind, EventKind::AgentResumed);
    }
}
