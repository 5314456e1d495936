use serde_json::Value;
use tracing::warn;

use crate::engine::Engine;
use crate::error::DriverError;
use crate::failure::{FailureRecord, RemoteFailure};

use super::envelope::MessageProperties;
use super::incoming::{DeliveryHandle, IncomingMessage};

/// What an RPC caller receives: the remote result, or the remote failure.
pub type ReplyOutcome = Result<Value, RemoteFailure>;

/// A received RPC reply with its outcome already resolved.
#[derive(Debug)]
pub struct ReplyMessage {
    message: IncomingMessage,
    outcome: ReplyOutcome,
}

impl ReplyMessage {
    /// A non-null `_failure` wins over `_result`. A failure record that does
    /// not deserialize still resolves the caller, as a generic failure.
    pub fn parse(
        engine: &Engine,
        delivery: DeliveryHandle,
        properties: &MessageProperties,
        body: &[u8],
    ) -> Result<Self, DriverError> {
        let mut message = IncomingMessage::parse(delivery, properties, body)?;
        let result = message.take_system("result").unwrap_or(Value::Null);
        let failure = message.take_system("failure").filter(|v| !v.is_null());

        let outcome = match failure {
            None => Ok(result),
            Some(raw) => Err(match serde_json::from_value::<FailureRecord>(raw.clone()) {
                Ok(record) => engine.reconstruct_failure(record),
                Err(err) => {
                    warn!(
                        msg_id = ?message.msg_id(),
                        error = %err,
                        "unreadable failure record in reply"
                    );
                    RemoteFailure::generic(FailureRecord {
                        message: raw.to_string(),
                        ..FailureRecord::default()
                    })
                }
            }),
        };

        Ok(Self { message, outcome })
    }

    pub fn msg_id(&self) -> Option<&str> {
        self.message.msg_id()
    }

    pub fn outcome(&self) -> &ReplyOutcome {
        &self.outcome
    }

    pub fn message(&self) -> &IncomingMessage {
        &self.message
    }

    pub fn into_parts(self) -> (IncomingMessage, ReplyOutcome) {
        (self.message, self.outcome)
    }

    pub async fn acknowledge(&mut self) -> Result<(), DriverError> {
        self.message.acknowledge().await
    }
}

#[cfg(test)]
#[path = "reply_tests.rs"]
mod tests;
