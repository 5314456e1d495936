use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::DriverError;
use crate::message::{
    Context, Deadline, MSG_ID_KEY, OutgoingMessage, Payload, REPLY_QUEUE_KEY, ReplyOutcome,
    SendOptions, remaining_budget,
};
use crate::transport::{ReplyListener, Retrier};

use super::waiters::ReplySlot;

/// Where an RPC message is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Falls back to the configured default exchange.
    pub exchange: Option<String>,
    pub topic: String,
    pub server: Option<String>,
    pub fanout: bool,
}

impl Target {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            exchange: None,
            topic: topic.into(),
            server: None,
            fanout: false,
        }
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn fanout(mut self) -> Self {
        self.fanout = true;
        self
    }
}

/// Removes a pending-result slot on every exit from a call, including the
/// caller dropping the call future. After a reply resolved the slot this is
/// a no-op.
struct WaiterGuard<'a> {
    listener: &'a dyn ReplyListener,
    msg_id: &'a str,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.listener.unregister_reply_waiter(self.msg_id);
    }
}

#[derive(Debug, Clone)]
pub struct RpcClient {
    engine: Arc<Engine>,
}

impl RpcClient {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Send `message` to `target`.
    ///
    /// Without a reply listener this is a one-way send that returns `None`
    /// once published. With one, the call waits for the matching reply until
    /// `expiration`, or for the configured `rpc_response_timeout` when none is
    /// given, and returns its result, or the remote failure as
    /// [`DriverError::Remote`]. A missed deadline at any step is
    /// `OperationTimeout`.
    pub async fn call(
        &self,
        target: &Target,
        message: Payload,
        context: Context,
        expiration: Option<Deadline>,
        reply_listener: Option<&dyn ReplyListener>,
        retrier: Option<&Retrier>,
    ) -> Result<Option<Value>, DriverError> {
        let engine = self.engine.as_ref();
        let no_ack = retrier.is_none();
        let exchange = engine.rpc_exchange_name(
            target.exchange.as_deref(),
            &target.topic,
            target.fanout,
            no_ack,
        );
        let routing_key = if target.fanout {
            String::new()
        } else {
            engine.rpc_queue_name(&target.topic, target.server.as_deref(), no_ack)
        };
        let outgoing = OutgoingMessage::new(message, context);
        let options = SendOptions::default();

        let Some(listener) = reply_listener else {
            outgoing
                .send(engine, &exchange, &routing_key, options, expiration, retrier)
                .await?;
            return Ok(None);
        };

        let expiration = expiration.or_else(|| engine.default_expiration());
        let msg_id = Uuid::new_v4().simple().to_string();
        let reply_queue = listener
            .reply_queue_name(remaining_budget(expiration)?)
            .await?;
        debug!(%msg_id, %reply_queue, %exchange, %routing_key, "sending RPC call");

        let mut body = outgoing.prepare();
        body.insert(MSG_ID_KEY.to_string(), Value::String(msg_id.clone()));
        body.insert(REPLY_QUEUE_KEY.to_string(), Value::String(reply_queue));

        let slot = listener.register_reply_waiter(&msg_id);
        let _guard = WaiterGuard {
            listener,
            msg_id: &msg_id,
        };

        outgoing
            .send_body(
                engine,
                &exchange,
                &routing_key,
                &body,
                options,
                expiration,
                retrier,
            )
            .await?;

        match wait_for_reply(slot, expiration).await? {
            Ok(result) => Ok(Some(result)),
            Err(failure) => {
                debug!(
                    %msg_id,
                    module = failure.module(),
                    class = failure.class(),
                    "RPC call failed remotely"
                );
                Err(DriverError::Remote(failure))
            }
        }
    }
}

async fn wait_for_reply(
    slot: ReplySlot,
    expiration: Option<Deadline>,
) -> Result<ReplyOutcome, DriverError> {
    let Some(budget) = remaining_budget(expiration)? else {
        return slot.wait().await;
    };

    let msg_id = slot.msg_id().to_string();
    match tokio::time::timeout(budget, slot.wait()).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(%msg_id, timeout_ms = budget.as_millis() as u64, "timed out waiting for reply");
            Err(DriverError::OperationTimeout(format!(
                "timed out waiting for a reply to message {msg_id}"
            )))
        }
    }
}

#[cfg(test)]
#[path = "call_tests.rs"]
mod tests;
