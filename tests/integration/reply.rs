use crate::*;

fn request_properties(ttl_ms: Option<&str>) -> MessageProperties {
    let mut properties = json_properties();
    properties.expiration = ttl_ms.map(str::to_string);
    properties
}

fn rpc_request(stack: &Stack, ttl_ms: Option<&str>) -> IncomingMessage {
    let body = serde_json::to_vec(&json!({
        "method": "ping",
        "_msg_id": "m-1",
        "_reply_q": "reply_abc",
        "_context_user": "u1",
    }))
    .expect("serialize");
    IncomingMessage::parse(
        stack.broker.delivery(false),
        &request_properties(ttl_ms),
        &body,
    )
    .expect("decode request")
}

#[tokio::test(start_paused = true)]
async fn reply_inherits_the_request_ttl() {
    let stack = stack(DriverConfig::default());
    let request = rpc_request(&stack, Some("5000"));

    request.reply(&stack.engine, Ok(Some(json!("pong")))).await;

    let sent = &stack.broker.published()[0];
    assert_eq!(sent.exchange, "rpc_reply");
    assert_eq!(sent.routing_key, "reply_abc");
    assert_eq!(sent.properties.expiration.as_deref(), Some("5000"));
    assert!(!sent.mandatory);
}

#[tokio::test]
async fn reply_goes_to_configured_reply_exchange() {
    let stack = stack(DriverConfig {
        rpc_reply_exchange: "replies".into(),
        ..DriverConfig::default()
    });
    let request = rpc_request(&stack, None);

    request.reply(&stack.engine, Ok(None)).await;

    let sent = &stack.broker.published()[0];
    assert_eq!(sent.exchange, "replies");
    let decoded = decode(&sent.properties, &sent.body).expect("decode");
    assert_eq!(decoded.context, object(json!({"user": "u1"})));
    assert_eq!(decoded.system.get("msg_id"), Some(&json!("m-1")));
    assert!(!decoded.system.contains_key("result"));
}

#[derive(Debug, thiserror::Error)]
#[error("quota exhausted for {tenant}")]
struct QuotaExhausted {
    tenant: String,
    #[source]
    source: std::io::Error,
}

#[tokio::test]
async fn local_errors_travel_as_failure_records() {
    let stack = stack(DriverConfig::default());
    let err = QuotaExhausted {
        tenant: "t1".into(),
        source: std::io::Error::other("disk full"),
    };
    let responder = spawn_responder(&stack, move |_| Err(FailureRecord::from_error(&err)));

    let err = stack
        .client
        .call(
            &Target::new("quota"),
            Payload::new(),
            Context::new(),
            None,
            Some(stack.listener.as_ref()),
            None,
        )
        .await
        .unwrap_err();

    let failure = err.as_remote().expect("remote failure");
    assert_eq!(failure.class(), "QuotaExhausted");
    assert_eq!(failure.message(), "quota exhausted for t1");
    assert_eq!(failure.trace(), ["caused by: disk full".to_string()]);
    responder.abort();
}

#[tokio::test(start_paused = true)]
async fn reply_send_is_retried_on_connection_failure() {
    let stack = stack(DriverConfig {
        rpc_reply_retry_attempts: 5,
        rpc_reply_retry_delay_ms: 100,
        ..DriverConfig::default()
    });
    stack.broker.fail_next_publishes([
        BrokerError::ConnectionClosed("reset".into()),
        BrokerError::SocketTimeout,
        BrokerError::ConnectionClosed("reset".into()),
    ]);
    let request = rpc_request(&stack, None);

    request.reply(&stack.engine, Ok(Some(json!(1)))).await;

    // SocketTimeout maps to ConnectionTimeout, which the reply retrier does not retry.
    assert_eq!(stack.broker.publish_attempts(), 2);
    assert!(stack.broker.published().is_empty());
}

#[tokio::test]
async fn disabled_reply_retrier_gives_up_after_one_attempt() {
    let stack = stack(DriverConfig {
        rpc_reply_retry_attempts: 0,
        ..DriverConfig::default()
    });
    stack
        .broker
        .fail_next_publishes([BrokerError::ConnectionClosed("reset".into())]);
    let request = rpc_request(&stack, None);

    request.reply(&stack.engine, Ok(Some(json!(1)))).await;

    assert_eq!(stack.broker.publish_attempts(), 1);
}
