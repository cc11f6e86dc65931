//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// watchlink - phone-side messaging host for smartwatch apps
#[derive(Parser, Debug)]
#[command(
    name = "watchlink",
    author,
    version,
    about = "Watch messaging host with simulated watches",
    long_about = "Sends key/value dictionaries to apps on connected watches and routes\n\
                  inbound messages to registered listeners.\n\n\
                  The bundled transport simulates the watches described in the\n\
                  configuration file."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "WATCHLINK_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "WATCHLINK_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a messaging session against the simulated watches
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),

    /// Encode a dictionary (JSON) into a hex frame
    Encode(EncodeArgs),

    /// Decode a hex frame into JSON
    Decode(DecodeArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "watchlink.toml", env = "WATCHLINK_CONFIG")]
    pub config: PathBuf,

    /// Target app by configured name (defaults to the first app)
    #[arg(long, env = "WATCHLINK_APP")]
    pub app: Option<String>,

    /// Number of dictionaries to broadcast
    #[arg(short = 'n', long, default_value = "10", env = "WATCHLINK_MESSAGES")]
    pub messages: u64,

    /// Pause between sends in milliseconds
    #[arg(long, default_value = "100")]
    pub interval_ms: u64,

    /// Session timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "WATCHLINK_TIMEOUT")]
    pub timeout: u64,

    /// Also have every watch send one message to the app
    #[arg(long)]
    pub inbound: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "WATCHLINK_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[arg(short, long, default_value = "watchlink.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[arg(short, long, default_value = "watchlink.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `encode` command
#[derive(Parser, Debug)]
pub struct EncodeArgs {
    /// Target app UUID
    #[arg(long)]
    pub app: String,

    /// Dictionary as JSON, e.g. '{"1":{"type":"text","value":"hi"}}'
    #[arg(long)]
    pub json: String,
}

/// Arguments for the `decode` command
#[derive(Parser, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex
    pub hex: String,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
