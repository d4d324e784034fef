//! Command-line interface handling for the relay.
//!
//! Every option overrides the matching setting from the configuration file;
//! see [`crate::config::AppConfig::apply_overrides`].

use clap::Parser;
use std::path::PathBuf;

/// Real-time WebSocket fan-out relay with a static file server
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "relay", version)]
pub struct CliArgs {
    /// Configuration file; created with defaults when missing
    #[arg(short = 'c', long = "config", value_name = "FILE", default_value = "config.toml")]
    pub config_path: PathBuf,

    /// Address the WebSocket relay listens on
    #[arg(short = 'b', long = "bind", value_name = "ADDRESS")]
    pub ws_bind_address: Option<String>,

    /// Address the static file server listens on
    #[arg(short = 'H', long = "http", value_name = "ADDRESS")]
    pub http_bind_address: Option<String>,

    /// Directory static files are served from
    #[arg(short = 'r', long = "root", value_name = "DIR")]
    pub document_root: Option<PathBuf>,

    /// trace, debug, info, warn or error
    #[arg(short = 'l', long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    pub json_logs: bool,
}
