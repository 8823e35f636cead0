//! jsonkv - command-line driver for the embedded JSON key-value store
//!
//! Usage:
//!   jsonkv [OPTIONS] <COMMAND>
//!
//! Commands:
//!   get <DATABASE> <KEY> [--default <JSON>]   Print a value
//!   set <DATABASE> <KEY> <JSON>               Store a value
//!
//! Options:
//!   -c, --config <FILE>          Configuration file path
//!   -d, --location <DIR>         Directory holding the database files
//!   --idle-timeout-ms <MS>       Auto-close delay (-1 = never)
//!   --flush-interval-ms <MS>     Minimum delay between flushes (<= 0 = none)
//!   -l, --log-level              Log level (error, warn, info, debug, trace)
//!   -h, --help                   Print help

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use jsonkv::config::Config;
use jsonkv::Store;

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    #[default]
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// jsonkv - embedded JSON key-value store
#[derive(Parser, Debug)]
#[command(name = "jsonkv")]
#[command(author = "jsonkv Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Read and write keys in JSON document databases")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the database files
    #[arg(short = 'd', long)]
    location: Option<PathBuf>,

    /// Milliseconds of inactivity before a database is closed (-1 = never)
    #[arg(long, allow_hyphen_values = true)]
    idle_timeout_ms: Option<i64>,

    /// Minimum milliseconds between flushes of one database (<= 0 = no limit)
    #[arg(long, allow_hyphen_values = true)]
    flush_interval_ms: Option<i64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the value stored under a key
    Get {
        database: String,
        key: String,
        /// JSON value printed when the key has no value
        #[arg(long, default_value = "null")]
        default: String,
    },
    /// Store a JSON value under a key
    Set {
        database: String,
        key: String,
        /// JSON value; anything that is not valid JSON is stored as a string
        value: String,
    },
}

/// Parse CLI input as JSON, falling back to a plain string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration file if specified, otherwise env overrides only
    let loaded = match &args.config {
        Some(config_path) => Config::load(config_path),
        None => Config::from_env(),
    };
    let mut file_config = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };

    // Setup logging - CLI overrides config, config overrides default (warn)
    let log_level = args.log_level.unwrap_or_else(|| {
        match file_config.log.level.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Warn,
        }
    });

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level.to_tracing_level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(path) = &args.config {
        info!("Loaded configuration from {:?}", path);
    }

    // CLI args override file config
    if args.location.is_some() {
        file_config.db.location = args.location;
    }
    if args.idle_timeout_ms.is_some() {
        file_config.db.idle_timeout_ms = args.idle_timeout_ms;
    }
    if args.flush_interval_ms.is_some() {
        file_config.db.flush_interval_ms = args.flush_interval_ms;
    }
    file_config.validate()?;

    let db_config = file_config.database();
    info!("  Location: {}", db_config.location.display());
    info!("  Idle timeout: {:?}", db_config.idle_timeout);
    info!("  Flush interval: {:?}", db_config.flush_interval);

    let store = Store::new(db_config);

    let outcome = match args.command {
        Command::Get {
            database,
            key,
            default,
        } => store
            .read(&database, &key, parse_value(&default))
            .await
            .map(|value| println!("{}", value)),
        Command::Set {
            database,
            key,
            value,
        } => store.write(&database, &key, &parse_value(&value)).await,
    };

    // Flush everything before exiting, even if the command failed
    let closed = store.shutdown().await;
    outcome?;
    closed?;

    Ok(())
}
