//! Long-running queue poller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::Instrument;

use super::{BatchReport, Delivery, QueueConsumer};
use crate::config::ConsumerConfig;
use crate::context::{Bindings, RequestContext};
use crate::services::{ReceivedMessage, ServiceError};

pub struct ConsumerWorker {
    bindings: Arc<Bindings>,
    consumer: QueueConsumer,
    batch_size: usize,
    poll_interval: Duration,
}

impl ConsumerWorker {
    pub fn new(bindings: Arc<Bindings>, consumer: QueueConsumer, config: &ConsumerConfig) -> Self {
        Self {
            bindings,
            consumer,
            batch_size: config.batch_size,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    /// Poll until shutdown is broadcast. A batch already received is always
    /// processed to the end before the loop observes shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let queue = self.bindings.queue.queue_name().to_string();
        tracing::info!(
            queue = %queue,
            batch_size = self.batch_size,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Queue consumer starting"
        );

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Queue consumer received shutdown signal, exiting loop");
                    break;
                }
                received = self.bindings.queue.receive(self.batch_size, self.poll_interval) => received,
            };

            match received {
                Ok(messages) if messages.is_empty() => {}
                Ok(messages) => {
                    self.process(messages.into_iter().map(|m| self.delivery(m)).collect())
                        .await;
                }
                Err(e) => {
                    tracing::error!(queue = %queue, error = %e, "Failed to receive from queue");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        tracing::info!(queue = %queue, "Queue consumer stopped");
    }

    /// Receive and process a single batch without waiting.
    pub async fn poll_once(&self) -> Result<BatchReport, ServiceError> {
        let messages = self.bindings.queue.receive(self.batch_size, Duration::ZERO).await?;
        if messages.is_empty() {
            return Ok(BatchReport::default());
        }
        Ok(self
            .process(messages.into_iter().map(|m| self.delivery(m)).collect())
            .await)
    }

    fn delivery(&self, message: ReceivedMessage) -> Delivery {
        Delivery::new(message, Arc::clone(&self.bindings.queue))
    }

    async fn process(&self, batch: Vec<Delivery>) -> BatchReport {
        let ctx = RequestContext::new(&self.bindings);
        let span = ctx.logger().span().clone();
        self.consumer
            .process_batch(&ctx, self.bindings.queue.queue_name(), batch)
            .instrument(span)
            .await
    }
}
