use std::time::Duration;

use super::*;
use crate::error::ErrorKind;
use crate::message::{CONTENT_TYPE_JSON, DEFAULT_CONTENT_ENCODING};
use crate::transport::BrokerError;
use crate::transport::memory::MemoryBroker;

fn props() -> MessageProperties {
    MessageProperties::outgoing(CONTENT_TYPE_JSON, DEFAULT_CONTENT_ENCODING, false)
}

#[tokio::test]
async fn unbounded_publish_leaves_expiration_unset() {
    let broker = MemoryBroker::new();
    publish(&broker, "E", "K", b"{}", &props(), true, None)
        .await
        .expect("publish");

    let published = broker.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].exchange, "E");
    assert_eq!(published[0].routing_key, "K");
    assert!(published[0].mandatory);
    assert_eq!(published[0].properties.expiration, None);
    assert_eq!(broker.acquire_timeouts(), vec![None]);
    assert_eq!(broker.outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn bounded_publish_sets_ttl_from_remaining_budget() {
    let broker = MemoryBroker::new();
    let deadline = Deadline::after(Duration::from_millis(1500));

    publish(&broker, "E", "K", b"{}", &props(), false, Some(deadline))
        .await
        .expect("publish");

    let published = broker.published();
    assert_eq!(published[0].properties.expiration.as_deref(), Some("1500"));
    assert_eq!(
        broker.acquire_timeouts(),
        vec![Some(Duration::from_millis(1500))]
    );
}

#[tokio::test(start_paused = true)]
async fn expired_deadline_never_touches_the_pool() {
    let broker = MemoryBroker::new();
    let deadline = Deadline::after(Duration::from_millis(5));
    tokio::time::advance(Duration::from_millis(6)).await;

    let err = publish(&broker, "E", "K", b"{}", &props(), true, Some(deadline))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::OperationTimeout);
    assert!(broker.acquire_timeouts().is_empty());
    assert_eq!(broker.publish_attempts(), 0);
}

#[tokio::test]
async fn connection_is_released_when_publish_fails() {
    let broker = MemoryBroker::new();
    broker.fail_next_publishes([BrokerError::Nack("queue full".into())]);

    let err = publish(&broker, "E", "K", b"{}", &props(), true, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MessageRejected);
    assert_eq!(broker.publish_attempts(), 1);
    assert_eq!(broker.outstanding(), 0);
    assert!(broker.published().is_empty());
}

#[tokio::test]
async fn acquisition_timeout_maps_to_operation_timeout() {
    let broker = MemoryBroker::new();
    broker.fail_next_acquires([BrokerError::PoolTimeout]);

    let err = publish(&broker, "E", "K", b"{}", &props(), true, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::OperationTimeout);
    assert_eq!(broker.publish_attempts(), 0);
}

#[tokio::test]
async fn missing_exchange_is_reported() {
    let broker = MemoryBroker::new();
    broker.fail_next_publishes([BrokerError::ChannelClosed {
        code: 404,
        reason: "NOT_FOUND".into(),
    }]);

    let err = publish(&broker, "nope", "K", b"{}", &props(), true, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExchangeNotFound);
    assert_eq!(broker.outstanding(), 0);
}
