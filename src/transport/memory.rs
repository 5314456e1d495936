//! In-process broker used by tests and local tooling.
//!
//! Records every publish, ack and nack, tracks checked-out connections, and can
//! be scripted to fail the next acquisitions or publishes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use crate::message::{DeliveryHandle, MessageProperties};

use super::{BrokerConnection, BrokerError, ConnectionPool, DeliveryChannel};

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
    pub properties: MessageProperties,
    pub mandatory: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack { delivery_tag: u64 },
    Nack { delivery_tag: u64, requeue: bool },
}

#[derive(Default)]
struct MemoryState {
    published: Vec<PublishedMessage>,
    publish_attempts: usize,
    publish_failures: VecDeque<BrokerError>,
    acquire_failures: VecDeque<BrokerError>,
    acquire_timeouts: Vec<Option<Duration>>,
    outstanding: usize,
    settlements: Vec<Settlement>,
    next_delivery_tag: u64,
}

#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<MemoryState>>,
    published_tx: broadcast::Sender<Arc<PublishedMessage>>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        let (published_tx, _) = broadcast::channel(256);
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            published_tx,
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        lock_state(&self.state)
    }

    /// Every successful publish, in order, as it reaches the broker.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PublishedMessage>> {
        self.published_tx.subscribe()
    }

    pub fn fail_next_publishes(&self, errors: impl IntoIterator<Item = BrokerError>) {
        self.state().publish_failures.extend(errors);
    }

    pub fn fail_next_acquires(&self, errors: impl IntoIterator<Item = BrokerError>) {
        self.state().acquire_failures.extend(errors);
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state().published.clone()
    }

    /// Publish calls that reached a connection, successful or not.
    pub fn publish_attempts(&self) -> usize {
        self.state().publish_attempts
    }

    /// Timeouts passed to `acquire`, one per call.
    pub fn acquire_timeouts(&self) -> Vec<Option<Duration>> {
        self.state().acquire_timeouts.clone()
    }

    /// Connections currently checked out and not yet returned.
    pub fn outstanding(&self) -> usize {
        self.state().outstanding
    }

    pub fn settlements(&self) -> Vec<Settlement> {
        self.state().settlements.clone()
    }

    /// A fresh delivery handle on this broker's channel.
    pub fn delivery(&self, no_ack: bool) -> DeliveryHandle {
        let tag = {
            let mut state = self.state();
            state.next_delivery_tag += 1;
            state.next_delivery_tag
        };
        DeliveryHandle::new(Arc::new(self.clone()), tag, no_ack)
    }
}

fn lock_state(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("memory broker lock poisoned; recovering state");
            poisoned.into_inner()
        }
    }
}

#[async_trait]
impl ConnectionPool for MemoryBroker {
    async fn acquire(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn BrokerConnection>, BrokerError> {
        let mut state = self.state();
        state.acquire_timeouts.push(timeout);
        if let Some(err) = state.acquire_failures.pop_front() {
            return Err(err);
        }
        state.outstanding += 1;
        Ok(Box::new(MemoryConnection {
            state: self.state.clone(),
            published_tx: self.published_tx.clone(),
        }))
    }
}

struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    published_tx: broadcast::Sender<Arc<PublishedMessage>>,
}

#[async_trait]
impl BrokerConnection for MemoryConnection {
    async fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: &MessageProperties,
        mandatory: bool,
    ) -> Result<(), BrokerError> {
        let message = {
            let mut state = lock_state(&self.state);
            state.publish_attempts += 1;
            if let Some(err) = state.publish_failures.pop_front() {
                return Err(err);
            }
            let message = PublishedMessage {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                body: body.to_vec(),
                properties: properties.clone(),
                mandatory,
            };
            state.published.push(message.clone());
            message
        };
        let _ = self.published_tx.send(Arc::new(message));
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let mut state = lock_state(&self.state);
        state.outstanding = state.outstanding.saturating_sub(1);
    }
}

#[async_trait]
impl DeliveryChannel for MemoryBroker {
    async fn basic_ack(&self, delivery_tag: u64) -> Result<(), BrokerError> {
        self.state()
            .settlements
            .push(Settlement::Ack { delivery_tag });
        Ok(())
    }

    async fn basic_nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError> {
        self.state().settlements.push(Settlement::Nack {
            delivery_tag,
            requeue,
        });
        Ok(())
    }
}
