use crate::*;

#[tokio::test]
async fn one_way_send_carries_payload_context_and_unique_id() {
    let stack = stack(DriverConfig::default());
    let message = OutgoingMessage::new(object(json!({"a": 1})), object(json!({"user": "u1"})));

    message
        .send(&stack.engine, "E", "K", SendOptions::default(), None, None)
        .await
        .expect("send");

    let published = stack.broker.published();
    assert_eq!(published.len(), 1);
    let sent = &published[0];
    assert_eq!((sent.exchange.as_str(), sent.routing_key.as_str()), ("E", "K"));
    assert_eq!(sent.properties.version(), Some("1.0"));

    let body: Value = serde_json::from_slice(&sent.body).expect("json body");
    assert_eq!(
        body,
        json!({"a": 1, "_context_user": "u1", "_unique_id": message.unique_id()})
    );
    assert_eq!(stack.broker.outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn connection_failures_are_retried_until_the_limit() {
    let stack = stack(DriverConfig::default());
    stack
        .broker
        .fail_next_publishes((0..10).map(|_| BrokerError::ConnectionClosed("reset".into())));
    let retrier = Retrier::new(Some(3), Duration::from_millis(50));

    let err = stack
        .client
        .call(
            &Target::new("compute"),
            Payload::new(),
            Context::new(),
            None,
            None,
            Some(&retrier),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConnectionFailure);
    assert_eq!(stack.broker.publish_attempts(), 4);
    assert_eq!(stack.broker.outstanding(), 0);
}

#[tokio::test]
async fn rejected_messages_are_not_retried() {
    let stack = stack(DriverConfig::default());
    stack
        .broker
        .fail_next_publishes([BrokerError::Nack("queue full".into())]);
    let retrier = Retrier::unbounded(Duration::from_millis(1));

    let err = stack
        .client
        .call(
            &Target::new("compute"),
            Payload::new(),
            Context::new(),
            None,
            None,
            Some(&retrier),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MessageRejected);
    assert_eq!(stack.broker.publish_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_deadline_never_reaches_the_broker() {
    let stack = stack(DriverConfig::default());
    let deadline = Deadline::after(Duration::from_millis(100));
    tokio::time::advance(Duration::from_millis(150)).await;

    let err = OutgoingMessage::new(Payload::new(), Context::new())
        .send(&stack.engine, "E", "K", SendOptions::default(), Some(deadline), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::OperationTimeout);
    assert!(stack.broker.acquire_timeouts().is_empty());
    assert_eq!(stack.broker.publish_attempts(), 0);
}

#[tokio::test]
async fn missing_exchange_surfaces_as_exchange_not_found() {
    let stack = stack(DriverConfig::default());
    stack.broker.fail_next_publishes([BrokerError::ChannelClosed {
        code: 404,
        reason: "NOT_FOUND - no exchange 'nova'".into(),
    }]);

    let err = stack
        .client
        .call(
            &Target::new("compute").with_exchange("nova"),
            Payload::new(),
            Context::new(),
            None,
            None,
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExchangeNotFound);
}

#[test]
fn published_body_decodes_with_the_codec() {
    let body = courier::message::encode(
        &object(json!({"method": "ping"})),
        &object(json!({"user": "u1"})),
        "uid",
    )
    .expect("encode");
    let decoded = decode(&json_properties(), &body).expect("decode");
    assert_eq!(decoded.payload, object(json!({"method": "ping"})));
    assert_eq!(decoded.context, object(json!({"user": "u1"})));
    assert_eq!(decoded.system, object(json!({"unique_id": "uid"})));
}
