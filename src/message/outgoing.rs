use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::DriverError;
use crate::transport::{Retrier, publish};

use super::deadline::Deadline;
use super::envelope::{
    CONTENT_TYPE_JSON, Context, DEFAULT_CONTENT_ENCODING, MessageProperties, Payload,
    check_content_type, compose, encode_body,
};

/// Publish flags for one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Use a connection with publisher confirms enabled.
    pub confirm: bool,
    /// Ask the broker to return the message if no queue is bound.
    pub mandatory: bool,
    pub persistent: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            confirm: true,
            mandatory: true,
            persistent: false,
        }
    }
}

/// A message about to be published: payload, context and a fresh unique id.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    payload: Payload,
    context: Context,
    content_type: String,
    content_encoding: String,
    unique_id: String,
}

impl OutgoingMessage {
    pub fn new(payload: Payload, context: Context) -> Self {
        Self {
            payload,
            context,
            content_type: CONTENT_TYPE_JSON.to_string(),
            content_encoding: DEFAULT_CONTENT_ENCODING.to_string(),
            unique_id: Uuid::new_v4().simple().to_string(),
        }
    }

    /// Only JSON bodies can be produced; anything else is refused up front.
    pub fn with_content(
        payload: Payload,
        context: Context,
        content_type: &str,
        content_encoding: &str,
    ) -> Result<Self, DriverError> {
        check_content_type(content_type)?;
        let mut message = Self::new(payload, context);
        message.content_encoding = content_encoding.to_string();
        Ok(message)
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// The wire body object, before any call-specific system fields are added.
    pub fn prepare(&self) -> Map<String, Value> {
        compose(&self.payload, &self.context, &self.unique_id)
    }

    pub fn properties(&self, persistent: bool) -> MessageProperties {
        MessageProperties::outgoing(&self.content_type, &self.content_encoding, persistent)
    }

    pub async fn send(
        &self,
        engine: &Engine,
        exchange: &str,
        routing_key: &str,
        options: SendOptions,
        expiration: Option<Deadline>,
        retrier: Option<&Retrier>,
    ) -> Result<(), DriverError> {
        let body = self.prepare();
        self.send_body(
            engine,
            exchange,
            routing_key,
            &body,
            options,
            expiration,
            retrier,
        )
        .await
    }

    /// Publish an already prepared body, under `retrier` when one is given.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_body(
        &self,
        engine: &Engine,
        exchange: &str,
        routing_key: &str,
        body: &Map<String, Value>,
        options: SendOptions,
        expiration: Option<Deadline>,
        retrier: Option<&Retrier>,
    ) -> Result<(), DriverError> {
        let bytes = encode_body(body)?;
        let properties = self.properties(options.persistent);
        let pool = engine.pool(options.confirm);

        debug!(
            unique_id = %self.unique_id,
            exchange,
            routing_key,
            confirm = options.confirm,
            retrying = retrier.is_some(),
            "sending message"
        );

        let (bytes, properties) = (&bytes, &properties);
        let attempt = move || {
            publish(
                pool,
                exchange,
                routing_key,
                bytes,
                properties,
                options.mandatory,
                expiration,
            )
        };
        match retrier {
            Some(retrier) => retrier.run(attempt).await,
            None => attempt().await,
        }
    }
}

#[cfg(test)]
#[path = "outgoing_tests.rs"]
mod tests;
