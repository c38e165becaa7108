//! Per-tag message handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::ConsumerError;
use crate::context::RequestContext;
use crate::services::{MessageType, QueueMessage};

/// Business logic for one message type.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, ctx: &RequestContext, message: &QueueMessage) -> Result<(), ConsumerError>;
}

/// Maps each [`MessageType`] to at most one handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<MessageType, Arc<dyn MessageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any previous one.
    pub fn register(mut self, kind: MessageType, handler: impl MessageHandler) -> Self {
        self.handlers.insert(kind, Arc::new(handler));
        self
    }

    pub fn get(&self, kind: MessageType) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn is_registered(&self, kind: MessageType) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
