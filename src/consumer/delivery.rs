//! A received message awaiting settlement.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::services::{MessageId, QueueBackend, ReceivedMessage, ServiceError};

/// One delivered message bound to the queue it came from.
///
/// `ack` and `retry` take `self`: a delivery settles exactly once.
pub struct Delivery {
    message: ReceivedMessage,
    queue: Arc<dyn QueueBackend>,
}

impl Delivery {
    pub fn new(message: ReceivedMessage, queue: Arc<dyn QueueBackend>) -> Self {
        Self { message, queue }
    }

    pub fn id(&self) -> MessageId {
        self.message.id
    }

    /// Delivery attempts including this one.
    pub fn attempts(&self) -> u32 {
        self.message.attempts
    }

    pub fn body(&self) -> &Value {
        &self.message.body
    }

    pub async fn ack(self) -> Result<MessageId, ServiceError> {
        self.queue.ack(self.message.id).await?;
        Ok(self.message.id)
    }

    pub async fn retry(self, delay: Duration) -> Result<MessageId, ServiceError> {
        self.queue.retry(self.message.id, delay).await?;
        Ok(self.message.id)
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("id", &self.message.id)
            .field("attempts", &self.message.attempts)
            .field("queue", &self.queue.queue_name())
            .finish()
    }
}
