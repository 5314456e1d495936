use std::fmt;

use thiserror::Error;

use crate::failure::RemoteFailure;

/// Semantic failure kind surfaced to callers. Retry predicates operate on
/// kinds, never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedVersion,
    UnsupportedContentType,
    MalformedBody,
    MessageRejected,
    RoutingFailure,
    ExchangeNotFound,
    ConnectionFailure,
    ConnectionTimeout,
    OperationTimeout,
    Remote,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::UnsupportedVersion => "unsupported_version",
            ErrorKind::UnsupportedContentType => "unsupported_content_type",
            ErrorKind::MalformedBody => "malformed_body",
            ErrorKind::MessageRejected => "message_rejected",
            ErrorKind::RoutingFailure => "routing_failure",
            ErrorKind::ExchangeNotFound => "exchange_not_found",
            ErrorKind::ConnectionFailure => "connection_failure",
            ErrorKind::ConnectionTimeout => "connection_timeout",
            ErrorKind::OperationTimeout => "operation_timeout",
            ErrorKind::Remote => "remote",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("message version {found:?} is not compatible with driver version {expected}")]
    UnsupportedVersion {
        found: Option<String>,
        expected: &'static str,
    },

    #[error("content-type '{0}' is not valid, 'application/json' only is supported")]
    UnsupportedContentType(String),

    #[error("malformed message body: {0}")]
    MalformedBody(String),

    #[error("message rejected by broker: {0}")]
    MessageRejected(String),

    #[error("message could not be routed to any queue: {0}")]
    RoutingFailure(String),

    #[error("exchange not found: {0}")]
    ExchangeNotFound(String),

    #[error("connectivity problem: {0}")]
    ConnectionFailure(String),

    #[error("socket timeout exceeded: {0}")]
    ConnectionTimeout(String),

    #[error("timeout for current operation was expired: {0}")]
    OperationTimeout(String),

    #[error(transparent)]
    Remote(#[from] RemoteFailure),
}

impl DriverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
            DriverError::UnsupportedContentType(_) => ErrorKind::UnsupportedContentType,
            DriverError::MalformedBody(_) => ErrorKind::MalformedBody,
            DriverError::MessageRejected(_) => ErrorKind::MessageRejected,
            DriverError::RoutingFailure(_) => ErrorKind::RoutingFailure,
            DriverError::ExchangeNotFound(_) => ErrorKind::ExchangeNotFound,
            DriverError::ConnectionFailure(_) => ErrorKind::ConnectionFailure,
            DriverError::ConnectionTimeout(_) => ErrorKind::ConnectionTimeout,
            DriverError::OperationTimeout(_) => ErrorKind::OperationTimeout,
            DriverError::Remote(_) => ErrorKind::Remote,
        }
    }

    pub(crate) fn deadline_expired() -> Self {
        DriverError::OperationTimeout("deadline already passed".to_string())
    }

    /// The remote failure carried by this error, if it came back in a reply.
    pub fn as_remote(&self) -> Option<&RemoteFailure> {
        match self {
            DriverError::Remote(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        DriverError::MalformedBody(err.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
