use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::DriverError;
use crate::message::ReplyOutcome;

/// The receiving half of one pending RPC result.
#[derive(Debug)]
pub struct ReplySlot {
    msg_id: String,
    rx: oneshot::Receiver<ReplyOutcome>,
}

impl ReplySlot {
    pub fn msg_id(&self) -> &str {
        &self.msg_id
    }

    /// Wait for the reply. Fails with `ConnectionFailure` if the waiter was
    /// dropped without an answer.
    pub async fn wait(self) -> Result<ReplyOutcome, DriverError> {
        self.rx.await.map_err(|_| {
            DriverError::ConnectionFailure(format!(
                "reply waiter for message {} was dropped",
                self.msg_id
            ))
        })
    }
}

/// Pending RPC results keyed by message id.
///
/// Every entry is removed exactly once: by the reply that resolves it, or by
/// the caller unregistering on timeout, failure or cancellation.
#[derive(Debug, Clone, Default)]
pub struct ReplyWaiters {
    inner: Arc<Mutex<HashMap<String, oneshot::Sender<ReplyOutcome>>>>,
}

impl ReplyWaiters {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<ReplyOutcome>>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("reply waiter lock poisoned; recovering state");
                poisoned.into_inner()
            }
        }
    }

    pub fn register(&self, msg_id: &str) -> ReplySlot {
        let (tx, rx) = oneshot::channel();
        if self.lock().insert(msg_id.to_string(), tx).is_some() {
            warn!(msg_id, "replaced an existing reply waiter");
        }
        ReplySlot {
            msg_id: msg_id.to_string(),
            rx,
        }
    }

    /// Hand `outcome` to the waiter for `msg_id`. Returns false when nobody
    /// is waiting; such late or unknown replies are discarded.
    pub fn resolve(&self, msg_id: &str, outcome: ReplyOutcome) -> bool {
        let Some(tx) = self.lock().remove(msg_id) else {
            debug!(msg_id, "discarding reply with no waiter");
            return false;
        };
        if tx.send(outcome).is_err() {
            debug!(msg_id, "reply waiter went away before the reply arrived");
            return false;
        }
        true
    }

    pub fn unregister(&self, msg_id: &str) -> bool {
        self.lock().remove(msg_id).is_some()
    }

    pub fn contains(&self, msg_id: &str) -> bool {
        self.lock().contains_key(msg_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "waiters_tests.rs"]
mod tests;
