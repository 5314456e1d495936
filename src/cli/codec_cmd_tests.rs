use super::*;

fn encode_args(payload: &str, context: Option<&str>) -> EncodeArgs {
    EncodeArgs {
        payload: payload.to_string(),
        context: context.map(str::to_string),
        persistent: false,
    }
}

fn decode_args(body: &str, version: &str) -> DecodeArgs {
    DecodeArgs {
        body: body.to_string(),
        version: version.to_string(),
        content_type: CONTENT_TYPE_JSON.to_string(),
        content_encoding: None,
    }
}

#[test]
fn encode_renders_properties_and_prefixed_body() {
    let out = encode(&encode_args(r#"{"a":1}"#, Some(r#"{"user":"u1"}"#))).expect("encode");

    assert_eq!(out["properties"]["headers"]["version"], json!("1.0"));
    assert_eq!(out["properties"]["content_type"], json!("application/json"));
    assert_eq!(out["properties"]["delivery_mode"], json!(1));
    assert_eq!(out["body"]["a"], json!(1));
    assert_eq!(out["body"]["_context_user"], json!("u1"));
    assert!(out["body"]["_unique_id"].is_string());
}

#[test]
fn encode_rejects_non_object_payload() {
    let err = encode(&encode_args("[1,2]", None)).unwrap_err();
    assert!(err.to_string().contains("payload must be a JSON object"));

    let err = encode(&encode_args("{", None)).unwrap_err();
    assert!(err.to_string().contains("payload is not valid JSON"));
}

#[test]
fn decode_splits_the_body() {
    let out = decode_body(&decode_args(
        r#"{"method":"ping","_context_user":"u1","_msg_id":"m-1"}"#,
        "1.0",
    ))
    .expect("decode");

    assert_eq!(out["payload"], json!({"method": "ping"}));
    assert_eq!(out["context"], json!({"user": "u1"}));
    assert_eq!(out["system"], json!({"msg_id": "m-1"}));
}

#[test]
fn decode_reports_incompatible_version() {
    let err = decode_body(&decode_args("{}", "2.0")).unwrap_err();
    assert!(format!("{err:#}").contains("2.0"));
}
