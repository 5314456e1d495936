use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Args;

use courier::config::DriverConfig;

use super::render_json;

#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Print as JSON instead of TOML.
    #[arg(long)]
    pub json: bool,
    /// Write the effective configuration to the config file.
    #[arg(long)]
    pub write: bool,
}

pub async fn run(path: Option<&Path>, args: ConfigArgs) -> Result<ExitCode> {
    let config = match path {
        Some(path) => DriverConfig::load(path).await?,
        None => DriverConfig::default(),
    };

    if args.write {
        let Some(path) = path else {
            bail!("--write needs a config file (--config or COURIER_CONFIG)");
        };
        config.save(path).await?;
        eprintln!("Wrote {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", render(&config, args.json)?);
    Ok(ExitCode::SUCCESS)
}

fn render(config: &DriverConfig, json: bool) -> Result<String> {
    if json {
        let value = serde_json::to_value(config).context("failed to serialize config")?;
        return render_json(&value);
    }
    toml::to_string_pretty(config).context("failed to serialize config")
}

#[cfg(test)]
#[path = "config_cmd_tests.rs"]
mod tests;
