use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use courier::config::DriverConfig;

mod cli;

use cli::codec_cmd::{DecodeArgs, EncodeArgs};
use cli::config_cmd::ConfigArgs;

#[derive(Debug, Parser)]
#[command(
    name = "courier",
    about = "Inspect and produce courier RPC wire envelopes",
    version = env!("CARGO_PKG_VERSION"),
    propagate_version = true
)]
struct Cli {
    /// Driver config file. Falls back to COURIER_CONFIG, then built-in defaults.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug-level logging when RUST_LOG is unset.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build a wire envelope and print its properties and body.
    Encode(EncodeArgs),
    /// Decode a wire body into payload, context and system fields.
    Decode(DecodeArgs),
    /// Show the effective driver configuration.
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let Cli {
        config,
        verbose: _,
        command,
    } = cli;

    match command {
        Commands::Encode(args) => {
            println!("{}", cli::render_json(&cli::codec_cmd::encode(&args)?)?);
        }
        Commands::Decode(args) => {
            println!("{}", cli::render_json(&cli::codec_cmd::decode_body(&args)?)?);
        }
        Commands::Config(args) => {
            let path = DriverConfig::discover_path(config.as_deref());
            return cli::config_cmd::run(path.as_deref(), args).await;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
