use anyhow::{Context, Result, bail};
use clap::Args;
use serde_json::{Map, Value, json};

use courier::message::{
    CONTENT_TYPE_JSON, DRIVER_VERSION, MessageProperties, OutgoingMessage, VERSION_HEADER, decode,
};

#[derive(Debug, Clone, Args)]
pub struct EncodeArgs {
    /// Payload as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub payload: String,
    /// Request context as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub context: Option<String>,
    /// Mark the message persistent (delivery mode 2).
    #[arg(long)]
    pub persistent: bool,
}

#[derive(Debug, Clone, Args)]
#[command(disable_version_flag = true)]
pub struct DecodeArgs {
    /// Wire body as received.
    #[arg(long, value_name = "JSON")]
    pub body: String,
    /// Value of the version header.
    #[arg(long, default_value = DRIVER_VERSION)]
    pub version: String,
    #[arg(long, default_value = CONTENT_TYPE_JSON)]
    pub content_type: String,
    #[arg(long)]
    pub content_encoding: Option<String>,
}

pub fn encode(args: &EncodeArgs) -> Result<Value> {
    let payload = parse_object("payload", &args.payload)?;
    let context = match &args.context {
        Some(raw) => parse_object("context", raw)?,
        None => Map::new(),
    };

    let message = OutgoingMessage::new(payload, context);
    let properties = serde_json::to_value(message.properties(args.persistent))
        .context("failed to render message properties")?;
    Ok(json!({
        "properties": properties,
        "body": Value::Object(message.prepare()),
    }))
}

pub fn decode_body(args: &DecodeArgs) -> Result<Value> {
    let mut properties = MessageProperties {
        content_type: Some(args.content_type.clone()),
        content_encoding: args.content_encoding.clone(),
        ..MessageProperties::default()
    };
    properties.headers.insert(
        VERSION_HEADER.to_string(),
        Value::String(args.version.clone()),
    );

    let decoded = decode(&properties, args.body.as_bytes()).context("failed to decode body")?;
    Ok(json!({
        "payload": decoded.payload,
        "context": decoded.context,
        "system": decoded.system,
    }))
}

fn parse_object(name: &str, raw: &str) -> Result<Map<String, Value>> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("{name} is not valid JSON"))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => bail!("{name} must be a JSON object"),
    }
}

#[cfg(test)]
#[path = "codec_cmd_tests.rs"]
mod tests;
