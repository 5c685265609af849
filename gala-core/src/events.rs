use gala_shared::events::WorkflowEvent;

/// Notification boundary. Publication happens after a successful commit and
/// is never awaited; a lost event must not fail the operation.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: WorkflowEvent);
}

/// Sink that drops everything. Used by tests and offline tooling.
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, event: WorkflowEvent) {
        tracing::trace!(topic = event.topic(), "event dropped (null sink)");
    }
}
