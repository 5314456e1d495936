use crate::*;

#[tokio::test]
async fn call_returns_result_computed_from_payload_and_context() {
    let stack = stack(DriverConfig::default());
    let responder = spawn_responder(&stack, |request| {
        let user = request.context.get("user").cloned().unwrap_or(Value::Null);
        let n = request.payload.get("n").and_then(Value::as_i64).unwrap_or(0);
        Ok(Some(json!({"user": user, "square": n * n})))
    });

    let result = stack
        .client
        .call(
            &Target::new("compute").with_server("host1"),
            object(json!({"n": 7})),
            object(json!({"user": "u1"})),
            Some(Deadline::after(Duration::from_secs(5))),
            Some(stack.listener.as_ref()),
            None,
        )
        .await
        .expect("call");

    assert_eq!(result, Some(json!({"user": "u1", "square": 49})));
    assert!(stack.listener.waiters().is_empty());

    let published = stack.broker.published();
    assert_eq!(published[0].routing_key, "no_ack.compute.host1");
    assert_eq!(published[1].exchange, "rpc_reply");
    assert_eq!(published[1].routing_key, stack.listener.queue());
    responder.abort();
}

#[tokio::test]
async fn concurrent_calls_each_get_their_own_reply() {
    let stack = stack(DriverConfig::default());
    let responder = spawn_responder(&stack, |request| {
        let n = request.payload.get("n").and_then(Value::as_i64).unwrap_or(0);
        Ok(Some(json!(n * 10)))
    });

    let mut calls = tokio::task::JoinSet::new();
    for n in 0..8i64 {
        let client = stack.client.clone();
        let listener = stack.listener.clone();
        calls.spawn(async move {
            let result = client
                .call(
                    &Target::new("compute"),
                    object(json!({"n": n})),
                    Context::new(),
                    Some(Deadline::after(Duration::from_secs(5))),
                    Some(listener.as_ref()),
                    None,
                )
                .await;
            (n, result)
        });
    }

    while let Some(joined) = calls.join_next().await {
        let (n, result) = joined.expect("call task");
        assert_eq!(result.expect("call"), Some(json!(n * 10)));
    }
    assert!(stack.listener.waiters().is_empty());
    responder.abort();
}

#[derive(Debug, thiserror::Error)]
#[error("volume {0} not found")]
struct VolumeNotFound(String);

#[tokio::test]
async fn allow_listed_remote_failure_is_rebuilt_locally() {
    let mut registry = FailureRegistry::new();
    registry.register("storage.errors", "VolumeNotFound", |record: &FailureRecord| {
        VolumeNotFound(record.message.clone())
    });
    let config = DriverConfig {
        allowed_remote_exmods: vec!["storage.errors".into()],
        ..DriverConfig::default()
    };
    let stack = stack_with_registry(config, registry);
    let responder = spawn_responder(&stack, |_| {
        Err(FailureRecord::new(
            "storage.errors",
            "VolumeNotFound",
            "vol-7",
            vec!["in attach".into()],
        ))
    });

    let err = stack
        .client
        .call(
            &Target::new("storage"),
            Payload::new(),
            Context::new(),
            None,
            Some(stack.listener.as_ref()),
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Remote);
    let failure = err.as_remote().expect("remote failure");
    assert_eq!(failure.kind(), FailureKind::Reconstructed);
    assert_eq!(
        failure.downcast_cause::<VolumeNotFound>().map(|e| e.0.as_str()),
        Some("vol-7")
    );
    assert_eq!(err.to_string(), "vol-7\nin attach");
    responder.abort();
}

#[tokio::test]
async fn unlisted_remote_failure_stays_generic() {
    let stack = stack(DriverConfig::default());
    let responder = spawn_responder(&stack, |_| {
        Err(FailureRecord::new("os.errors", "PermissionDenied", "nope", vec![]))
    });

    let err = stack
        .client
        .call(
            &Target::new("compute"),
            Payload::new(),
            Context::new(),
            None,
            Some(stack.listener.as_ref()),
            None,
        )
        .await
        .unwrap_err();

    let failure = err.as_remote().expect("remote failure");
    assert_eq!(failure.kind(), FailureKind::Generic);
    assert_eq!(failure.module(), "os.errors");
    assert_eq!(failure.class(), "PermissionDenied");
    responder.abort();
}

#[tokio::test(start_paused = true)]
async fn unanswered_call_times_out_within_its_deadline() {
    let stack = stack(DriverConfig::default());
    let started = tokio::time::Instant::now();

    let err = stack
        .client
        .call(
            &Target::new("compute"),
            Payload::new(),
            Context::new(),
            Some(Deadline::after(Duration::from_secs(2))),
            Some(stack.listener.as_ref()),
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::OperationTimeout);
    assert!(started.elapsed() < Duration::from_millis(2100));
    assert!(stack.listener.waiters().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reply_after_timeout_is_acknowledged_and_discarded() {
    let stack = stack(DriverConfig::default());
    let mut published = stack.broker.subscribe();

    let err = stack
        .client
        .call(
            &Target::new("compute"),
            Payload::new(),
            Context::new(),
            Some(Deadline::after(Duration::from_secs(1))),
            Some(stack.listener.as_ref()),
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OperationTimeout);

    let request = published.recv().await.expect("request was published");
    let request = IncomingMessage::parse(
        stack.broker.delivery(false),
        &request.properties,
        &request.body,
    )
    .expect("decode request");
    request
        .reply(&stack.engine, Ok(Some(json!("too late"))))
        .await;

    let late = published.recv().await.expect("reply was published");
    let reply = ReplyMessage::parse(
        &stack.engine,
        stack.broker.delivery(false),
        &late.properties,
        &late.body,
    )
    .expect("decode reply");
    let tag = reply.message().delivery().delivery_tag();

    let resolved = stack.listener.deliver(reply).await.expect("deliver");
    assert!(!resolved);
    assert!(stack.listener.waiters().is_empty());
    assert!(
        stack
            .broker
            .settlements()
            .contains(&Settlement::Ack { delivery_tag: tag })
    );
}

#[tokio::test]
async fn listener_can_be_used_through_the_trait_object() {
    let stack = stack(DriverConfig::default());
    let listener: &dyn ReplyListener = stack.listener.as_ref();
    let queue = listener.reply_queue_name(None).await.expect("queue name");
    assert_eq!(queue, stack.listener.queue());
}
