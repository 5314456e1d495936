use std::fmt;
use std::sync::Arc;

use crate::config::DriverConfig;
use crate::failure::{FailureRecord, FailureRegistry, RemoteFailure};
use crate::message::Deadline;
use crate::transport::ConnectionPool;

/// Shared driver state: configuration, connection pools, and the remote
/// failure registry.
#[derive(Clone)]
pub struct Engine {
    config: DriverConfig,
    pool: Arc<dyn ConnectionPool>,
    confirm_pool: Arc<dyn ConnectionPool>,
    failures: FailureRegistry,
}

impl Engine {
    /// `confirm_pool` hands out connections with publisher confirms enabled.
    pub fn new(
        config: DriverConfig,
        pool: Arc<dyn ConnectionPool>,
        confirm_pool: Arc<dyn ConnectionPool>,
    ) -> Self {
        Self {
            config,
            pool,
            confirm_pool,
            failures: FailureRegistry::new(),
        }
    }

    pub fn with_failure_registry(mut self, failures: FailureRegistry) -> Self {
        self.failures = failures;
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn pool(&self, confirm: bool) -> &dyn ConnectionPool {
        if confirm {
            self.confirm_pool.as_ref()
        } else {
            self.pool.as_ref()
        }
    }

    pub fn failures(&self) -> &FailureRegistry {
        &self.failures
    }

    pub fn reconstruct_failure(&self, record: FailureRecord) -> RemoteFailure {
        self.failures
            .reconstruct(record, &self.config.allowed_remote_exmods)
    }

    /// Deadline for a call that did not bring its own. `None` when the
    /// configured timeout is too large to represent.
    pub fn default_expiration(&self) -> Option<Deadline> {
        Deadline::checked_after(self.config.rpc_response_timeout())
    }

    pub fn rpc_exchange_name(
        &self,
        exchange: Option<&str>,
        topic: &str,
        fanout: bool,
        no_ack: bool,
    ) -> String {
        let exchange = exchange.unwrap_or(&self.config.default_rpc_exchange);
        if fanout {
            format!("{exchange}_fanout_{}_{topic}", ack_mode(no_ack))
        } else {
            exchange.to_string()
        }
    }

    pub fn rpc_queue_name(&self, topic: &str, server: Option<&str>, no_ack: bool) -> String {
        match server {
            Some(server) => format!("{}.{topic}.{server}", ack_mode(no_ack)),
            None => format!("{}.{topic}", ack_mode(no_ack)),
        }
    }
}

fn ack_mode(no_ack: bool) -> &'static str {
    if no_ack { "no_ack" } else { "with_ack" }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
