//! Fuzz target: parse arbitrary broker properties and body as an incoming
//! courier message. The first bytes are split off as NUL-separated expiration,
//! version and content-encoding values; the rest is the body.
//! Must not panic regardless of input, and no underscore key may land in the
//! payload.

#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::Value;

use courier::message::{
    CONTENT_TYPE_JSON, DEFAULT_CONTENT_ENCODING, IncomingMessage, MessageProperties,
    VERSION_HEADER,
};
use courier::transport::memory::MemoryBroker;

fn next_field<'a>(data: &mut &'a [u8]) -> Option<String> {
    let end = data.iter().position(|b| *b == 0)?;
    let field = String::from_utf8_lossy(&data[..end]).into_owned();
    *data = &data[end + 1..];
    Some(field)
}

fuzz_target!(|data: &[u8]| {
    let mut rest = data;
    let mut properties =
        MessageProperties::outgoing(CONTENT_TYPE_JSON, DEFAULT_CONTENT_ENCODING, false);
    properties.expiration = next_field(&mut rest);
    if let Some(version) = next_field(&mut rest) {
        properties
            .headers
            .insert(VERSION_HEADER.to_string(), Value::String(version));
    }
    if let Some(encoding) = next_field(&mut rest) {
        properties.content_encoding = Some(encoding);
    }

    let broker = MemoryBroker::new();
    if let Ok(message) = IncomingMessage::parse(broker.delivery(false), &properties, rest) {
        assert!(message.payload.keys().all(|k| !k.starts_with('_')));
    }
});
