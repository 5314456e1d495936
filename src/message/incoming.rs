use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::engine::Engine;
use crate::error::DriverError;
use crate::failure::FailureRecord;
use crate::transport::DeliveryChannel;

use super::deadline::Deadline;
use super::envelope::{
    Context, FAILURE_KEY, MSG_ID_KEY, MessageProperties, Payload, RESULT_KEY, SystemFields,
    decode,
};
use super::outgoing::{OutgoingMessage, SendOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Acknowledged,
    Requeued,
}

/// Settlement handle for one received message.
///
/// A message is settled at most once. In no-ack mode the broker already
/// considers it delivered, so settling does nothing.
pub struct DeliveryHandle {
    channel: Arc<dyn DeliveryChannel>,
    delivery_tag: u64,
    no_ack: bool,
    state: DeliveryState,
}

impl DeliveryHandle {
    pub fn new(channel: Arc<dyn DeliveryChannel>, delivery_tag: u64, no_ack: bool) -> Self {
        Self {
            channel,
            delivery_tag,
            no_ack,
            state: DeliveryState::Pending,
        }
    }

    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    pub fn no_ack(&self) -> bool {
        self.no_ack
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    pub async fn acknowledge(&mut self) -> Result<(), DriverError> {
        if !self.should_settle("acknowledge") {
            return Ok(());
        }
        self.channel.basic_ack(self.delivery_tag).await?;
        self.state = DeliveryState::Acknowledged;
        Ok(())
    }

    /// Negative-acknowledge with requeue so the broker redelivers.
    pub async fn requeue(&mut self) -> Result<(), DriverError> {
        if !self.should_settle("requeue") {
            return Ok(());
        }
        self.channel.basic_nack(self.delivery_tag, true).await?;
        self.state = DeliveryState::Requeued;
        Ok(())
    }

    fn should_settle(&self, action: &str) -> bool {
        if self.no_ack {
            return false;
        }
        if self.state != DeliveryState::Pending {
            warn!(
                delivery_tag = self.delivery_tag,
                state = ?self.state,
                action,
                "delivery already settled; ignoring"
            );
            return false;
        }
        true
    }
}

impl fmt::Debug for DeliveryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryHandle")
            .field("delivery_tag", &self.delivery_tag)
            .field("no_ack", &self.no_ack)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// A decoded message received from the broker.
#[derive(Debug)]
pub struct IncomingMessage {
    pub payload: Payload,
    pub context: Context,
    system: SystemFields,
    version: Option<String>,
    content_type: String,
    content_encoding: String,
    expiration: Option<Deadline>,
    delivery: DeliveryHandle,
}

impl IncomingMessage {
    /// Decode `body` under `properties` and take ownership of its delivery.
    pub fn parse(
        delivery: DeliveryHandle,
        properties: &MessageProperties,
        body: &[u8],
    ) -> Result<Self, DriverError> {
        let decoded = decode(properties, body)?;
        let expiration = properties.expiration_millis().and_then(|ms| {
            let deadline = Deadline::from_ttl_millis(ms);
            if deadline.is_none() {
                warn!(ttl_ms = ms, "ignoring unusable message TTL");
            }
            deadline
        });

        Ok(Self {
            payload: decoded.payload,
            context: decoded.context,
            system: decoded.system,
            version: properties.version().map(str::to_string),
            content_type: properties.content_type().to_string(),
            content_encoding: properties.content_encoding().to_string(),
            expiration,
            delivery,
        })
    }

    /// System fields with their leading underscore removed.
    pub fn system(&self) -> &SystemFields {
        &self.system
    }

    pub(crate) fn take_system(&mut self, name: &str) -> Option<Value> {
        self.system.remove(name)
    }

    fn system_str(&self, name: &str) -> Option<&str> {
        self.system.get(name).and_then(Value::as_str)
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.system_str("unique_id")
    }

    pub fn msg_id(&self) -> Option<&str> {
        self.system_str("msg_id")
    }

    pub fn reply_queue(&self) -> Option<&str> {
        self.system_str("reply_q")
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn content_encoding(&self) -> &str {
        &self.content_encoding
    }

    /// Absolute deadline derived from the TTL the message arrived with.
    pub fn expiration(&self) -> Option<Deadline> {
        self.expiration
    }

    pub fn delivery(&self) -> &DeliveryHandle {
        &self.delivery
    }

    pub async fn acknowledge(&mut self) -> Result<(), DriverError> {
        self.delivery.acknowledge().await
    }

    pub async fn requeue(&mut self) -> Result<(), DriverError> {
        self.delivery.requeue().await
    }

    /// Answer an RPC request.
    ///
    /// Does nothing unless the request carried both a message id and a reply
    /// queue. The reply goes to the configured reply exchange, bounded by the
    /// request's own expiration and retried per configuration. Send failures
    /// are logged, never returned.
    pub async fn reply(&self, engine: &Engine, outcome: Result<Option<Value>, FailureRecord>) {
        let (Some(msg_id), Some(reply_queue)) = (self.msg_id(), self.reply_queue()) else {
            debug!("message is not an RPC request; not replying");
            return;
        };

        let mut body = Payload::new();
        body.insert(MSG_ID_KEY.to_string(), Value::String(msg_id.to_string()));
        match outcome {
            Ok(Some(result)) => {
                body.insert(RESULT_KEY.to_string(), result);
            }
            Ok(None) => {}
            Err(record) => match serde_json::to_value(&record) {
                Ok(failure) => {
                    body.insert(FAILURE_KEY.to_string(), failure);
                }
                Err(err) => {
                    error!(msg_id, reply_queue, error = %err, "failed to serialize failure");
                    return;
                }
            },
        }

        let message = match OutgoingMessage::with_content(
            body,
            self.context.clone(),
            &self.content_type,
            &self.content_encoding,
        ) {
            Ok(message) => message,
            Err(err) => {
                error!(msg_id, reply_queue, error = %err, "failed to build reply");
                return;
            }
        };

        let options = SendOptions {
            confirm: true,
            mandatory: false,
            persistent: false,
        };
        let retrier = engine.config().reply_retrier();
        let exchange = &engine.config().rpc_reply_exchange;

        match message
            .send(
                engine,
                exchange,
                reply_queue,
                options,
                self.expiration,
                retrier.as_ref(),
            )
            .await
        {
            Ok(()) => debug!(msg_id, reply_queue, "message replied"),
            Err(err) => error!(msg_id, reply_queue, error = %err, "failed to send reply"),
        }
    }
}

#[cfg(test)]
#[path = "incoming_tests.rs"]
mod tests;
