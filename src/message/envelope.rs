use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DriverError;

pub const DRIVER_VERSION: &str = "1.0";
pub const VERSION_HEADER: &str = "version";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const DEFAULT_CONTENT_ENCODING: &str = "utf-8";

pub const CONTEXT_PREFIX: &str = "_context_";
pub const SYSTEM_PREFIX: &str = "_";

pub const UNIQUE_ID_KEY: &str = "_unique_id";
pub const MSG_ID_KEY: &str = "_msg_id";
pub const REPLY_QUEUE_KEY: &str = "_reply_q";
pub const RESULT_KEY: &str = "_result";
pub const FAILURE_KEY: &str = "_failure";

/// Application fields of a message body.
pub type Payload = Map<String, Value>;
/// Request context, de-prefixed.
pub type Context = Map<String, Value>;
/// Reserved `_`-prefixed body fields, de-prefixed (`msg_id`, `reply_q`, ...).
pub type SystemFields = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum DeliveryMode {
    #[default]
    Transient,
    Persistent,
}

impl DeliveryMode {
    pub fn from_persistent(persistent: bool) -> Self {
        if persistent {
            DeliveryMode::Persistent
        } else {
            DeliveryMode::Transient
        }
    }
}

impl From<DeliveryMode> for u8 {
    fn from(mode: DeliveryMode) -> u8 {
        match mode {
            DeliveryMode::Transient => 1,
            DeliveryMode::Persistent => 2,
        }
    }
}

impl TryFrom<u8> for DeliveryMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(DeliveryMode::Transient),
            2 => Ok(DeliveryMode::Persistent),
            other => Err(format!("invalid delivery mode {other}")),
        }
    }
}

/// Broker-level message properties that travel beside the body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(default)]
    pub headers: Map<String, Value>,
    /// Per-message TTL in milliseconds, as the broker expects it: a decimal string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_mode: Option<DeliveryMode>,
}

impl MessageProperties {
    /// Properties for an outgoing message, stamped with the driver version.
    pub fn outgoing(content_type: &str, content_encoding: &str, persistent: bool) -> Self {
        let mut headers = Map::new();
        headers.insert(
            VERSION_HEADER.to_string(),
            Value::String(DRIVER_VERSION.to_string()),
        );
        Self {
            content_type: Some(content_type.to_string()),
            content_encoding: Some(content_encoding.to_string()),
            headers,
            expiration: None,
            delivery_mode: Some(DeliveryMode::from_persistent(persistent)),
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.headers.get(VERSION_HEADER).and_then(Value::as_str)
    }

    pub fn content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or(CONTENT_TYPE_JSON)
    }

    pub fn content_encoding(&self) -> &str {
        self.content_encoding
            .as_deref()
            .unwrap_or(DEFAULT_CONTENT_ENCODING)
    }

    pub fn expiration_millis(&self) -> Option<f64> {
        self.expiration.as_deref()?.trim().parse::<f64>().ok()
    }
}

/// Same major line is compatible; a missing or unparsable version never is.
pub fn version_is_compatible(found: Option<&str>, own: &str) -> bool {
    fn major(version: &str) -> Option<u32> {
        version.split('.').next()?.trim().parse().ok()
    }

    match (found.and_then(major), major(own)) {
        (Some(found), Some(own)) => found == own,
        _ => false,
    }
}

pub fn check_content_type(content_type: &str) -> Result<(), DriverError> {
    if content_type != CONTENT_TYPE_JSON {
        return Err(DriverError::UnsupportedContentType(
            content_type.to_string(),
        ));
    }
    Ok(())
}

fn check_content_encoding(encoding: &str) -> Result<(), DriverError> {
    if encoding.eq_ignore_ascii_case("utf-8") || encoding.eq_ignore_ascii_case("utf8") {
        return Ok(());
    }
    Err(DriverError::MalformedBody(format!(
        "unsupported content-encoding '{encoding}'"
    )))
}

/// Merge payload, context and the unique id into one wire body object.
pub fn compose(payload: &Payload, context: &Context, unique_id: &str) -> Map<String, Value> {
    let mut body = payload.clone();
    body.insert(
        UNIQUE_ID_KEY.to_string(),
        Value::String(unique_id.to_string()),
    );
    for (key, value) in context {
        body.insert(format!("{CONTEXT_PREFIX}{key}"), value.clone());
    }
    body
}

pub fn encode_body(body: &Map<String, Value>) -> Result<Vec<u8>, DriverError> {
    Ok(serde_json::to_vec(body)?)
}

pub fn encode(payload: &Payload, context: &Context, unique_id: &str) -> Result<Vec<u8>, DriverError> {
    encode_body(&compose(payload, context, unique_id))
}

/// A wire body split back into its three parts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decoded {
    pub payload: Payload,
    pub context: Context,
    pub system: SystemFields,
}

/// Decode a wire body.
///
/// Version is checked first, then content-type; the body is parsed only when
/// both pass.
pub fn decode(properties: &MessageProperties, body: &[u8]) -> Result<Decoded, DriverError> {
    let version = properties.version();
    if !version_is_compatible(version, DRIVER_VERSION) {
        return Err(DriverError::UnsupportedVersion {
            found: version.map(str::to_string),
            expected: DRIVER_VERSION,
        });
    }
    check_content_type(properties.content_type())?;
    check_content_encoding(properties.content_encoding())?;

    let parsed: Value = serde_json::from_slice(body)?;
    let Value::Object(fields) = parsed else {
        return Err(DriverError::MalformedBody(
            "message body must be a JSON object".to_string(),
        ));
    };

    Ok(partition(fields))
}

fn partition(fields: Map<String, Value>) -> Decoded {
    let mut decoded = Decoded::default();
    for (key, value) in fields {
        if let Some(name) = key.strip_prefix(CONTEXT_PREFIX) {
            decoded.context.insert(name.to_string(), value);
        } else if let Some(name) = key.strip_prefix(SYSTEM_PREFIX) {
            decoded.system.insert(name.to_string(), value);
        } else {
            decoded.payload.insert(key, value);
        }
    }
    decoded
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
