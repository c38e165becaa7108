//! Batch dispatcher.

use std::time::Duration;

use tracing::Instrument;

use crate::config::WorkerConfig;
use crate::context::RequestContext;
use crate::log_event;
use crate::observability::metrics;
use crate::resilience::{calculate_backoff, run_detached};
use crate::services::{MessageId, QueueMessage};

use super::{ConsumerError, Delivery, HandlerRegistry};

/// What happened to each message of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub acknowledged: Vec<MessageId>,
    pub retried: Vec<MessageId>,
    /// Messages whose ack or retry could not be committed. They stay leased
    /// until the queue's visibility timeout returns them.
    pub unsettled: Vec<MessageId>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.acknowledged.len() + self.retried.len() + self.unsettled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

enum Settlement {
    Ack,
    Retry(Duration),
}

/// Dispatches delivered messages to their handlers and settles each one.
pub struct QueueConsumer {
    registry: HandlerRegistry,
    handler_timeout: Duration,
    settle_timeout: Duration,
    retry_base_ms: u64,
    retry_max_ms: u64,
}

impl QueueConsumer {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self::from_config(registry, &WorkerConfig::default())
    }

    pub fn from_config(registry: HandlerRegistry, config: &WorkerConfig) -> Self {
        Self {
            registry,
            handler_timeout: Duration::from_millis(config.consumer.handler_timeout_ms),
            settle_timeout: Duration::from_millis(config.timeouts.call_ms),
            retry_base_ms: config.queue.retry_base_delay_ms,
            retry_max_ms: config.queue.retry_max_delay_ms,
        }
    }

    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    pub fn with_retry_delays(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.retry_base_ms = base_ms;
        self.retry_max_ms = max_ms;
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Process `batch` in delivery order. Never fails as a whole.
    pub async fn process_batch(
        &self,
        ctx: &RequestContext,
        queue: &str,
        batch: Vec<Delivery>,
    ) -> BatchReport {
        log_event!(ctx.logger(), INFO, queue, batch_size = batch.len(), "Processing queue batch");
        metrics::record_batch_size(queue, batch.len());

        let mut report = BatchReport::default();
        for delivery in batch {
            let id = delivery.id();
            let decoded = serde_json::from_value::<QueueMessage>(delivery.body().clone())
                .map_err(|e| ConsumerError::Decode(e.to_string()));
            let label = decoded.as_ref().map_or("unknown", |message| message.kind.as_str());
            let result = match &decoded {
                Ok(message) => self.dispatch(ctx, &delivery, message).await,
                Err(e) => Err(e.clone()),
            };

            let settlement = match result {
                Ok(()) => Settlement::Ack,
                Err(e) => {
                    log_event!(
                        ctx.logger(),
                        ERROR,
                        message_id = %id,
                        attempt = delivery.attempts(),
                        error = %e,
                        body = %delivery.body(),
                        "Failed to process message"
                    );
                    Settlement::Retry(calculate_backoff(
                        delivery.attempts(),
                        self.retry_base_ms,
                        self.retry_max_ms,
                    ))
                }
            };
            self.settle(ctx, delivery, label, settlement, &mut report).await;
        }

        log_event!(
            ctx.logger(),
            INFO,
            queue,
            acknowledged = report.acknowledged.len(),
            retried = report.retried.len(),
            unsettled = report.unsettled.len(),
            "Queue batch processed"
        );
        report
    }

    /// Run the handler registered for the message's tag.
    async fn dispatch(
        &self,
        ctx: &RequestContext,
        delivery: &Delivery,
        message: &QueueMessage,
    ) -> Result<(), ConsumerError> {
        log_event!(
            ctx.logger(),
            INFO,
            message_type = message.kind.as_str(),
            project_id = %message.project_id,
            message_id = %delivery.id(),
            attempt = delivery.attempts(),
            "Processing message"
        );

        let Some(handler) = self.registry.get(message.kind) else {
            log_event!(
                ctx.logger(),
                WARN,
                message_type = message.kind.as_str(),
                project_id = %message.project_id,
                "No handler registered for message type, acknowledging"
            );
            return Ok(());
        };

        let span = ctx.logger().span().clone();
        let task = tokio::spawn({
            let ctx = ctx.clone();
            let message = message.clone();
            async move { handler.handle(&ctx, &message).await }.instrument(span)
        });
        let abort = task.abort_handle();

        match tokio::time::timeout(self.handler_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ConsumerError::Panicked {
                message_type: message.kind,
                reason: join_error.to_string(),
            }),
            Err(_) => {
                abort.abort();
                Err(ConsumerError::Timeout {
                    message_type: message.kind,
                    after: self.handler_timeout,
                })
            }
        }
    }

    async fn settle(
        &self,
        ctx: &RequestContext,
        delivery: Delivery,
        label: &'static str,
        settlement: Settlement,
        report: &mut BatchReport,
    ) {
        let id = delivery.id();
        let (operation, outcome) = match settlement {
            Settlement::Ack => (
                "acknowledged",
                run_detached("queue.ack", self.settle_timeout, delivery.ack()).await,
            ),
            Settlement::Retry(delay) => {
                log_event!(
                    ctx.logger(),
                    INFO,
                    message_id = %id,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying message"
                );
                (
                    "retried",
                    run_detached("queue.retry", self.settle_timeout, delivery.retry(delay)).await,
                )
            }
        };

        match outcome {
            Ok(_) => {
                metrics::record_message_outcome(label, operation);
                if operation == "acknowledged" {
                    report.acknowledged.push(id);
                } else {
                    report.retried.push(id);
                }
            }
            Err(e) => {
                log_event!(
                    ctx.logger(),
                    ERROR,
                    message_id = %id,
                    outcome = operation,
                    error = %e,
                    "Failed to settle message"
                );
                metrics::record_message_outcome(label, "unsettled");
                report.unsettled.push(id);
            }
        }
    }
}
