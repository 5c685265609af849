use tokio::sync::broadcast;
use tracing::debug;

use gala_core::EventSink;
use gala_shared::events::WorkflowEvent;

/// In-process notification bus. Subscribers (SSE fan-out, the notification
/// collaborator) receive events best-effort; publication never blocks or
/// fails the emitting operation.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: WorkflowEvent) {
        let topic = event.topic();
        match self.tx.send(event) {
            Ok(receivers) => debug!(topic, receivers, "event published"),
            Err(_) => debug!(topic, "event published with no subscribers"),
        }
    }
}
