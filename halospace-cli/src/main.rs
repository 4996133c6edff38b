use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use halospace_core::config::Config;
use halospace_core::core_keys::PublicKey;
use halospace_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use std::path::PathBuf;
use tracing::info;

mod demo;
mod replay;

#[derive(Parser, Debug)]
#[command(name = "halospace")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<LogLevel>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// TOML configuration file; HALOSPACE_* environment variables apply otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate Ed25519 keys and print them with their secret seeds
    Keygen {
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Build a sample space, replay it and print the resulting state
    Demo {
        /// Also write the credential log, in the format `replay` reads
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Replay a credential log and print the resulting state
    Replay {
        /// Hex-encoded space key
        #[arg(long)]
        space_key: PublicKey,

        /// JSON array of `{ "credential": ..., "sourceFeed": ... }`
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::from_env()?,
    };

    let mut log_config = LogConfig::from(&config.logging).with_target(false);
    if let Some(level) = args.log_level {
        log_config.level = level;
    }
    if args.json_logs {
        log_config = log_config.json_format(true);
    }
    init_logging_with_config(log_config)?;
    halospace_core::metrics::init_metrics();

    let output = match args.command {
        Command::Keygen { count } => keygen(count)?,
        Command::Demo { out } => {
            let log = demo::build_space()?;
            if let Some(path) = out {
                replay::write_log(&path, &log.entries)?;
                info!(path = %path.display(), credentials = log.entries.len(), "Credential log written");
            }
            let summary = replay::replay(log.space_key, log.entries, &config).await?;
            serde_json::to_value(summary)?
        }
        Command::Replay { space_key, file } => {
            let entries = replay::read_log(&file)?;
            let summary = replay::replay(space_key, entries, &config).await?;
            serde_json::to_value(summary)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn keygen(count: usize) -> Result<serde_json::Value> {
    use rand::RngCore;
    let keyring = halospace_core::Keyring::new();

    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        let public_key = keyring.import_seed(&seed)?;
        keys.push(serde_json::json!({ "publicKey": public_key, "seed": hex::encode(seed) }));
    }
    Ok(serde_json::Value::Array(keys))
}
