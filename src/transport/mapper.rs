use crate::error::DriverError;

use super::BrokerError;

/// AMQP reply code for a channel closed because the exchange does not exist.
pub const EXCHANGE_NOT_FOUND_CODE: u16 = 404;

/// Classify a publish failure, naming the target in the message.
pub fn map_publish_error(err: BrokerError, exchange: &str, routing_key: &str) -> DriverError {
    let target = format!(" [exchange: {exchange}, routing_key: {routing_key}]");
    classify(err, &target)
}

impl From<BrokerError> for DriverError {
    fn from(err: BrokerError) -> Self {
        classify(err, "")
    }
}

fn classify(err: BrokerError, target: &str) -> DriverError {
    match err {
        BrokerError::Nack(reason) => {
            DriverError::MessageRejected(format!("can not send message to target{target}: {reason}"))
        }
        BrokerError::Unroutable(reason) => DriverError::RoutingFailure(format!(
            "can not deliver message to any queue using target{target}: {reason}"
        )),
        BrokerError::PoolTimeout => DriverError::OperationTimeout(format!(
            "connection acquisition for target{target} timed out"
        )),
        BrokerError::ChannelClosed { code, reason } if code == EXCHANGE_NOT_FOUND_CODE => {
            DriverError::ExchangeNotFound(format!(
                "attempt to send message to not existing exchange, target{target}: {reason}"
            ))
        }
        BrokerError::ChannelClosed { code, reason } => DriverError::ConnectionFailure(format!(
            "channel closed ({code}) while sending to target{target}: {reason}"
        )),
        BrokerError::ConnectionClosed(reason) => DriverError::ConnectionFailure(format!(
            "connectivity problem detected while sending to target{target}: {reason}"
        )),
        BrokerError::SocketTimeout => {
            DriverError::ConnectionTimeout(format!("while sending to target{target}"))
        }
    }
}

#[cfg(test)]
#[path = "mapper_tests.rs"]
mod tests;
