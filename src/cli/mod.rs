pub mod codec_cmd;
pub mod config_cmd;

use anyhow::{Context, Result};
use serde_json::Value;

pub fn render_json(value: &Value) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to render JSON output")
}
