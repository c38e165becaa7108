//! Queue capability, message taxonomy, and the per-request send adapter.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{probe_health, CallTimeouts, ServiceError, ServiceHealth};
use crate::log_event;
use crate::observability::RequestLogger;
use crate::resilience::run_detached;

/// Pipeline stage a message represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    IdeaToDocs,
    DocToTasks,
    AgentRun,
    SyncToGithub,
}

impl MessageType {
    pub const ALL: [MessageType; 4] = [
        MessageType::IdeaToDocs,
        MessageType::DocToTasks,
        MessageType::AgentRun,
        MessageType::SyncToGithub,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::IdeaToDocs => "idea_to_docs",
            MessageType::DocToTasks => "doc_to_tasks",
            MessageType::AgentRun => "agent_run",
            MessageType::SyncToGithub => "sync_to_github",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of asynchronous work: `{type, data, project_id, retry_count?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub data: Value,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

impl QueueMessage {
    pub fn new(kind: MessageType, project_id: impl Into<String>, data: Value) -> Self {
        Self {
            kind,
            data,
            project_id: project_id.into(),
            retry_count: None,
        }
    }
}

/// Backend-assigned delivery identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message as handed out by [`QueueBackend::receive`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub id: MessageId,
    /// Delivery attempts including this one.
    pub attempts: u32,
    /// Raw body exactly as sent.
    pub body: Value,
}

/// Managed message queue with per-message settlement.
#[async_trait]
pub trait QueueBackend: Send + Sync + 'static {
    fn queue_name(&self) -> &str;

    async fn send(&self, body: Value) -> Result<MessageId, ServiceError>;

    async fn send_batch(&self, bodies: Vec<Value>) -> Result<Vec<MessageId>, ServiceError>;

    /// Up to `max` messages, waiting at most `wait` for the first one.
    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<ReceivedMessage>, ServiceError>;

    /// Remove a delivered message for good.
    async fn ack(&self, id: MessageId) -> Result<(), ServiceError>;

    /// Make a delivered message available again after `delay`.
    async fn retry(&self, id: MessageId, delay: Duration) -> Result<(), ServiceError>;

    async fn probe(&self) -> Result<(), ServiceError>;
}

/// Queue producer handle bound to one request.
#[derive(Clone)]
pub struct QueueService {
    backend: Arc<dyn QueueBackend>,
    logger: RequestLogger,
    timeouts: CallTimeouts,
}

impl QueueService {
    pub fn new(backend: Arc<dyn QueueBackend>, logger: RequestLogger, timeouts: CallTimeouts) -> Self {
        Self {
            backend,
            logger,
            timeouts,
        }
    }

    pub fn queue_name(&self) -> &str {
        self.backend.queue_name()
    }

    pub async fn send_one(&self, message: &QueueMessage) -> Result<MessageId, ServiceError> {
        let kind = message.kind.as_str();
        let project_id = message.project_id.as_str();
        log_event!(self.logger, DEBUG, message_type = kind, project_id, "Sending message to queue");

        let backend = Arc::clone(&self.backend);
        let body = serde_json::to_value(message);
        run_detached("queue.send", self.timeouts.call, async move {
            backend.send(body?).await
        })
        .await
        .inspect(|id| {
            log_event!(
                self.logger,
                INFO,
                message_type = kind,
                project_id,
                message_id = id.0,
                "Message sent to queue"
            )
        })
        .inspect_err(|e| {
            log_event!(
                self.logger,
                ERROR,
                message_type = kind,
                project_id,
                error = %e,
                "Failed to send message to queue"
            )
        })
    }

    pub async fn send_batch(&self, messages: &[QueueMessage]) -> Result<Vec<MessageId>, ServiceError> {
        let count = messages.len();
        log_event!(self.logger, DEBUG, count, "Sending batch messages to queue");

        let backend = Arc::clone(&self.backend);
        let bodies = messages
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>();
        run_detached("queue.send_batch", self.timeouts.call, async move {
            backend.send_batch(bodies?).await
        })
        .await
        .inspect(|_| log_event!(self.logger, INFO, count, "Batch messages sent to queue"))
        .inspect_err(|e| {
            for message in messages {
                log_event!(
                    self.logger,
                    ERROR,
                    count,
                    message_type = message.kind.as_str(),
                    project_id = %message.project_id,
                    error = %e,
                    "Failed to send batch messages to queue"
                );
            }
        })
    }

    pub async fn health_check(&self) -> ServiceHealth {
        let backend = Arc::clone(&self.backend);
        probe_health("queue", &self.logger, self.timeouts, async move {
            backend.probe().await
        })
        .await
    }
}
