//! In-process queue backend.
//!
//! # States
//! ```text
//! send → ready ─receive→ in_flight ─ack→ (gone)
//!                            │
//!                            ├─retry→ delayed ─(delay elapsed)→ ready
//!                            │     └→ dead_letters (attempts exhausted)
//!                            └─(visibility timeout, unsettled)→ ready
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::queue::{MessageId, QueueBackend, ReceivedMessage};
use super::ServiceError;
use crate::config::QueueConfig;

#[derive(Debug, Clone)]
struct StoredMessage {
    id: MessageId,
    body: Value,
    attempts: u32,
}

#[derive(Default)]
struct QueueState {
    next_id: u64,
    ready: VecDeque<StoredMessage>,
    delayed: Vec<(Instant, StoredMessage)>,
    /// Leased messages with the instant their lease lapses.
    in_flight: HashMap<MessageId, (Instant, StoredMessage)>,
    dead_letters: Vec<StoredMessage>,
}

impl QueueState {
    fn enqueue(&mut self, body: Value) -> MessageId {
        self.next_id += 1;
        let id = MessageId(self.next_id);
        self.ready.push_back(StoredMessage {
            id,
            body,
            attempts: 0,
        });
        id
    }

    fn promote_due(&mut self, now: Instant) {
        let (due, waiting): (Vec<_>, Vec<_>) = self
            .delayed
            .drain(..)
            .partition(|(visible_at, _)| *visible_at <= now);
        self.delayed = waiting;
        self.ready.extend(due.into_iter().map(|(_, message)| message));
    }

    /// Return lapsed leases to the queue, oldest message first. Returns the
    /// ids that exhausted their attempts instead.
    fn reclaim_expired(&mut self, now: Instant, max_retries: u32) -> Vec<MessageId> {
        let expired: Vec<MessageId> = self
            .in_flight
            .iter()
            .filter(|(_, (lease_ends, _))| *lease_ends <= now)
            .map(|(id, _)| *id)
            .collect();

        let mut reclaimed: Vec<StoredMessage> = expired
            .into_iter()
            .filter_map(|id| self.in_flight.remove(&id).map(|(_, message)| message))
            .collect();
        reclaimed.sort_by_key(|message| message.id);

        let mut exhausted = Vec::new();
        for message in reclaimed {
            if message.attempts > max_retries {
                exhausted.push(message.id);
                self.dead_letters.push(message);
            } else {
                self.ready.push_back(message);
            }
        }
        exhausted
    }

    fn next_visible_at(&self) -> Option<Instant> {
        let delayed = self.delayed.iter().map(|(at, _)| *at);
        let leases = self.in_flight.values().map(|(lease_ends, _)| *lease_ends);
        delayed.chain(leases).min()
    }
}

/// Lease length when none is configured.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(60);

/// Single-process queue with redelivery and dead-lettering.
pub struct MemoryQueueBackend {
    name: String,
    max_retries: u32,
    visibility_timeout: Duration,
    state: Mutex<QueueState>,
    arrivals: Notify,
}

impl MemoryQueueBackend {
    pub fn new(name: impl Into<String>, max_retries: u32) -> Self {
        Self {
            name: name.into(),
            max_retries,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            state: Mutex::new(QueueState::default()),
            arrivals: Notify::new(),
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.name.clone(), config.max_retries)
            .with_visibility_timeout(Duration::from_millis(config.visibility_timeout_ms))
    }

    /// How long a received message stays hidden before it is redelivered
    /// without an ack or retry.
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Messages waiting for delivery, including delayed ones.
    pub fn pending(&self) -> usize {
        let state = self.state();
        state.ready.len() + state.delayed.len()
    }

    pub fn in_flight(&self) -> usize {
        self.state().in_flight.len()
    }

    /// Bodies of messages that exhausted their retries.
    pub fn dead_letters(&self) -> Vec<(MessageId, Value)> {
        self.state()
            .dead_letters
            .iter()
            .map(|m| (m.id, m.body.clone()))
            .collect()
    }

    fn take_ready(&self, max: usize) -> (Vec<ReceivedMessage>, Option<Instant>) {
        let now = Instant::now();
        let mut state = self.state();
        for id in state.reclaim_expired(now, self.max_retries) {
            tracing::warn!(
                queue = %self.name,
                message_id = %id,
                "Unsettled message exhausted retries, moving to dead letters"
            );
        }
        state.promote_due(now);

        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(mut message) = state.ready.pop_front() else {
                break;
            };
            message.attempts += 1;
            batch.push(ReceivedMessage {
                id: message.id,
                attempts: message.attempts,
                body: message.body.clone(),
            });
            state
                .in_flight
                .insert(message.id, (now + self.visibility_timeout, message));
        }
        (batch, state.next_visible_at())
    }
}

#[async_trait]
impl QueueBackend for MemoryQueueBackend {
    fn queue_name(&self) -> &str {
        &self.name
    }

    async fn send(&self, body: Value) -> Result<MessageId, ServiceError> {
        let id = self.state().enqueue(body);
        self.arrivals.notify_one();
        Ok(id)
    }

    async fn send_batch(&self, bodies: Vec<Value>) -> Result<Vec<MessageId>, ServiceError> {
        let ids = {
            let mut state = self.state();
            bodies.into_iter().map(|body| state.enqueue(body)).collect()
        };
        self.arrivals.notify_one();
        Ok(ids)
    }

    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<ReceivedMessage>, ServiceError> {
        let deadline = Instant::now() + wait;
        loop {
            let (batch, next_visible) = self.take_ready(max);
            if !batch.is_empty() || max == 0 {
                return Ok(batch);
            }
            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }

            let wake_at = next_visible.map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                _ = self.arrivals.notified() => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn ack(&self, id: MessageId) -> Result<(), ServiceError> {
        self.state()
            .in_flight
            .remove(&id)
            .map(|_| ())
            .ok_or(ServiceError::UnknownMessage(id))
    }

    async fn retry(&self, id: MessageId, delay: Duration) -> Result<(), ServiceError> {
        {
            let mut state = self.state();
            let (_, message) = state
                .in_flight
                .remove(&id)
                .ok_or(ServiceError::UnknownMessage(id))?;

            if message.attempts > self.max_retries {
                tracing::warn!(
                    queue = %self.name,
                    message_id = %id,
                    attempts = message.attempts,
                    "Message exhausted retries, moving to dead letters"
                );
                state.dead_letters.push(message);
                return Ok(());
            }

            if delay.is_zero() {
                state.ready.push_back(message);
            } else {
                state.delayed.push((Instant::now() + delay, message));
            }
        }
        self.arrivals.notify_one();
        Ok(())
    }

    async fn probe(&self) -> Result<(), ServiceError> {
        // Lock acquisition is the whole liveness check.
        drop(self.state());
        Ok(())
    }
}
