use tracing::debug;

use crate::error::DriverError;
use crate::message::{Deadline, MessageProperties, remaining_budget};

use super::{ConnectionPool, map_publish_error};

/// One publish attempt through a pooled connection.
///
/// An already-expired `expiration` fails with `OperationTimeout` before the
/// pool is touched. The connection is checked out for the duration of this
/// call only and goes back to the pool on every exit path. When bounded, the
/// remaining budget after acquisition becomes the message TTL.
pub async fn publish(
    pool: &dyn ConnectionPool,
    exchange: &str,
    routing_key: &str,
    body: &[u8],
    properties: &MessageProperties,
    mandatory: bool,
    expiration: Option<Deadline>,
) -> Result<(), DriverError> {
    let timeout = remaining_budget(expiration)?;

    let mut connection = pool
        .acquire(timeout)
        .await
        .map_err(|err| map_publish_error(err, exchange, routing_key))?;

    let mut properties = properties.clone();
    if let Some(ttl) = remaining_budget(expiration)? {
        properties.expiration = Some(ttl.as_millis().to_string());
    }

    debug!(
        exchange,
        routing_key,
        body_len = body.len(),
        mandatory,
        expiration = ?properties.expiration,
        "publishing message"
    );

    connection
        .publish(exchange, routing_key, body, &properties, mandatory)
        .await
        .map_err(|err| map_publish_error(err, exchange, routing_key))
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;
