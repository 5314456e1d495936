use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::DriverError;
use crate::message::ReplyMessage;
use crate::transport::ReplyListener;

use super::waiters::{ReplySlot, ReplyWaiters};

/// Reply listener bound to one named queue.
///
/// Consuming the queue is left to the embedding process; each reply it
/// receives is handed to [`QueueReplyListener::deliver`].
#[derive(Debug, Clone)]
pub struct QueueReplyListener {
    queue: String,
    waiters: ReplyWaiters,
}

impl QueueReplyListener {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            waiters: ReplyWaiters::new(),
        }
    }

    /// A listener on a fresh `reply_<hex>` queue name.
    pub fn with_random_queue() -> Self {
        Self::new(format!("reply_{}", Uuid::new_v4().simple()))
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn waiters(&self) -> &ReplyWaiters {
        &self.waiters
    }

    /// Route a reply to its waiter, then acknowledge it. Replies nobody is
    /// waiting for are acknowledged and dropped. Returns whether a waiter
    /// received it.
    pub async fn deliver(&self, reply: ReplyMessage) -> Result<bool, DriverError> {
        let (mut message, outcome) = reply.into_parts();
        let resolved = match message.msg_id() {
            Some(msg_id) => self.waiters.resolve(msg_id, outcome),
            None => {
                debug!(queue = %self.queue, "reply without a message id");
                false
            }
        };
        message.acknowledge().await?;
        Ok(resolved)
    }
}

#[async_trait]
impl ReplyListener for QueueReplyListener {
    async fn reply_queue_name(&self, remaining: Option<Duration>) -> Result<String, DriverError> {
        if remaining.is_some_and(|budget| budget.is_zero()) {
            return Err(DriverError::OperationTimeout(format!(
                "no time left to set up reply queue {}",
                self.queue
            )));
        }
        Ok(self.queue.clone())
    }

    fn register_reply_waiter(&self, msg_id: &str) -> ReplySlot {
        self.waiters.register(msg_id)
    }

    fn unregister_reply_waiter(&self, msg_id: &str) {
        self.waiters.unregister(msg_id);
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
