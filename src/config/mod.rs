use std::env;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::transport::Retrier;

pub const CONFIG_ENV: &str = "COURIER_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Exchange used for RPC targets that do not name their own.
    pub default_rpc_exchange: String,
    pub rpc_reply_exchange: String,
    /// Retries after the first RPC reply send, so `n` allows `n + 1` sends.
    /// `-1` retries forever and `0` sends once without retrying.
    pub rpc_reply_retry_attempts: i64,
    pub rpc_reply_retry_delay_ms: u64,
    pub rpc_response_timeout_secs: u64,
    /// Modules whose remote failures may be rebuilt into registered local types.
    pub allowed_remote_exmods: Vec<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            default_rpc_exchange: "rpc".to_string(),
            rpc_reply_exchange: "rpc_reply".to_string(),
            rpc_reply_retry_attempts: -1,
            rpc_reply_retry_delay_ms: 250,
            rpc_response_timeout_secs: 60,
            allowed_remote_exmods: Vec::new(),
        }
    }
}

impl DriverConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read config: {}", path.display()));
            }
        };
        toml::from_str::<Self>(&raw)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        let serialized = toml::to_string_pretty(self)
            .with_context(|| format!("failed to serialize config: {}", path.display()))?;
        tokio::fs::write(path, serialized)
            .await
            .with_context(|| format!("failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// CLI override, then `COURIER_CONFIG`, then nothing (defaults).
    pub fn discover_path(override_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = override_path {
            return Some(path.to_path_buf());
        }
        match env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Some(PathBuf::from(path)),
            _ => None,
        }
    }

    pub fn rpc_response_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_response_timeout_secs)
    }

    pub fn rpc_reply_retry_delay(&self) -> Duration {
        Duration::from_millis(self.rpc_reply_retry_delay_ms)
    }

    /// Retrier for sending RPC replies; retries connection failures only.
    pub fn reply_retrier(&self) -> Option<Retrier> {
        match self.rpc_reply_retry_attempts {
            0 => None,
            n if n < 0 => Some(Retrier::unbounded(self.rpc_reply_retry_delay())),
            n => Some(Retrier::new(
                Some(u32::try_from(n).unwrap_or(u32::MAX)),
                self.rpc_reply_retry_delay(),
            )),
        }
    }
}
