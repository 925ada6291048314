//! CLI argument definitions for Thermogate.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Thermogate - per-user front end for a heating controller.
///
/// Start with `thermogate config check` to validate a configuration, then
/// `thermogate serve` to run the web service.
#[derive(Parser, Debug)]
#[command(name = "thermogate")]
#[command(author, version, about = "Per-user authorization and override reconciliation for a heating controller", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long = "log-json", global = true, env = "TG_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the web service
    Serve(ServeArgs),

    /// Configuration inspection commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Arguments of `serve`
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Configuration file (KDL). Defaults to ~/.config/thermogate/config.kdl
    #[arg(short, long, env = "TG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "TG_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "TG_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Base URL of the control bridge
    #[arg(long, env = "TG_GATEWAY_URL", conflicts_with = "simulate", required_unless_present = "simulate")]
    pub gateway_url: Option<String>,

    /// Use an in-memory simulated plant instead of a bridge
    #[arg(long)]
    pub simulate: bool,

    /// Timeout for each gateway call, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub gateway_timeout_ms: u64,

    /// URL receiving system-mode notifications (logged only when unset)
    #[arg(long, env = "TG_NOTIFY_URL")]
    pub notify_url: Option<String>,

    /// Timeout for each notification, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub notify_timeout_ms: u64,

    /// Request header carrying the authenticated user name
    #[arg(long, default_value = "x-remote-user")]
    pub identity_header: String,
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Load and validate a configuration file
    Check {
        /// Configuration file (KDL)
        #[arg(short, long, env = "TG_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Show what a caller resolves to under a configuration
    Resolve {
        /// Configuration file (KDL)
        #[arg(short, long, env = "TG_CONFIG")]
        config: Option<PathBuf>,

        /// Caller identity (anonymous when omitted)
        #[arg(short, long)]
        identity: Option<String>,
    },
}
