//! Queue consumption.
//!
//! # Data Flow
//! ```text
//! worker.rs (poll loop)
//!     → QueueBackend::receive(batch_size, poll_interval)
//!     → fresh RequestContext per batch
//!     → processor.rs: for each Delivery, in order
//!         decode → dispatch by MessageType → handler.rs
//!         → Ok  → ack
//!         → Err → retry after backoff(attempts)
//!     → BatchReport
//! ```
//!
//! # Design Decisions
//! - Each message settles independently; there is no batch-wide transaction
//! - A `Delivery` is consumed by `ack`/`retry`, so it cannot settle twice
//! - Handlers run on their own task; a panic retries that message only
//! - Tags without a registered handler are acknowledged with a warning
//! - Retry policy lives here and nowhere else

pub mod delivery;
pub mod handler;
pub mod processor;
pub mod worker;

use std::time::Duration;

use crate::services::{MessageType, ServiceError};

pub use delivery::Delivery;
pub use handler::{HandlerRegistry, MessageHandler};
pub use processor::{BatchReport, QueueConsumer};
pub use worker::ConsumerWorker;

/// Why a single message could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsumerError {
    #[error("invalid message body: {0}")]
    Decode(String),

    #[error("{message_type} handler failed: {reason}")]
    Handler {
        message_type: MessageType,
        reason: String,
    },

    #[error("{message_type} handler timed out after {after:?}")]
    Timeout {
        message_type: MessageType,
        after: Duration,
    },

    #[error("{message_type} handler panicked: {reason}")]
    Panicked {
        message_type: MessageType,
        reason: String,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ConsumerError {
    pub fn handler(message_type: MessageType, reason: impl Into<String>) -> Self {
        ConsumerError::Handler {
            message_type,
            reason: reason.into(),
        }
    }
}
