//! Broker-facing seams.
//!
//! The driver never owns sockets or channel lifecycles. Connections come from a
//! [`ConnectionPool`] under a deadline, received messages are settled through a
//! [`DeliveryChannel`], and reply destinations come from a [`ReplyListener`].

mod mapper;
pub mod memory;
mod publisher;
mod retry;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::DriverError;
use crate::message::MessageProperties;
use crate::rpc::ReplySlot;

pub use mapper::{EXCHANGE_NOT_FOUND_CODE, map_publish_error};
pub use publisher::publish;
pub use retry::Retrier;

/// Failures reported by the broker client library, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// Publisher confirm came back negative.
    #[error("broker nacked the message: {0}")]
    Nack(String),
    /// Mandatory publish matched no queue and was returned.
    #[error("message returned as unroutable: {0}")]
    Unroutable(String),
    #[error("timed out acquiring a pooled connection")]
    PoolTimeout,
    #[error("channel closed by broker ({code}): {reason}")]
    ChannelClosed { code: u16, reason: String },
    #[error("connection closed: {0}")]
    ConnectionClosed(String),
    #[error("socket timeout")]
    SocketTimeout,
}

/// A connection checked out of a pool. Dropping it returns it to the pool.
#[async_trait]
pub trait BrokerConnection: Send {
    async fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: &MessageProperties,
        mandatory: bool,
    ) -> Result<(), BrokerError>;
}

#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Check out a connection, waiting at most `timeout` (`None` waits forever).
    async fn acquire(&self, timeout: Option<Duration>)
    -> Result<Box<dyn BrokerConnection>, BrokerError>;
}

/// Acknowledge primitives of the channel a message arrived on.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn basic_ack(&self, delivery_tag: u64) -> Result<(), BrokerError>;
    async fn basic_nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError>;
}

/// Supplies the reply destination for RPC calls and the pending-result slots
/// replies are delivered into.
#[async_trait]
pub trait ReplyListener: Send + Sync {
    /// Name of the queue replies should be routed to, obtained within `remaining`.
    async fn reply_queue_name(&self, remaining: Option<Duration>) -> Result<String, DriverError>;

    fn register_reply_waiter(&self, msg_id: &str) -> ReplySlot;

    fn unregister_reply_waiter(&self, msg_id: &str);
}
