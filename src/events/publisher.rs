use super::{ExecutionEvent, Notifier};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

/// Broadcast-channel event publisher for lifecycle notifications
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl Notifier for EventPublisher {
    async fn notify(&self, event: ExecutionEvent) {
        // send() errors when there are no subscribers; publishing into the
        // void is acceptable for fire-and-forget notifications.
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            warn!(
                execution_id = %event.execution_id,
                event_type = ?event.event_type,
                "no notification subscribers, event dropped"
            );
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
