//! Configuration management for the relay.
//!
//! This module handles loading, validation, and conversion of the relay
//! configuration from TOML files and command-line arguments.

use crate::cli::CliArgs;
use relay_server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Listening endpoints
    #[serde(default)]
    pub server: ServerSettings,
    /// Static file settings
    #[serde(default)]
    pub static_files: StaticFileSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Listening endpoints and housekeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    /// WebSocket relay address (e.g., "127.0.0.1:8080")
    #[serde(default = "default_ws_bind_address")]
    pub ws_bind_address: String,
    /// Static file HTTP address
    #[serde(default = "default_http_bind_address")]
    pub http_bind_address: String,
    /// Seconds between health log lines (0 to disable)
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,
}

fn default_ws_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_http_bind_address() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_health_interval() -> u64 {
    60
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            ws_bind_address: default_ws_bind_address(),
            http_bind_address: default_http_bind_address(),
            health_interval_secs: default_health_interval(),
        }
    }
}

/// Static file responder settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaticFileSettings {
    /// Directory requests are resolved against
    pub document_root: String,
    /// Document served for `/`
    pub index_document: String,
    /// Document served with every 404
    pub not_found_document: String,
}

impl Default for StaticFileSettings {
    fn default() -> Self {
        Self {
            document_root: "public".to_string(),
            index_document: "main.html".to_string(),
            not_found_document: "404.html".to_string(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration there and
    /// returns it.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies command-line overrides on top of the file settings.
    pub fn apply_overrides(&mut self, args: &CliArgs) {
        if let Some(address) = &args.ws_bind_address {
            self.server.ws_bind_address = address.clone();
        }
        if let Some(address) = &args.http_bind_address {
            self.server.http_bind_address = address.clone();
        }
        if let Some(root) = &args.document_root {
            self.static_files.document_root = root.to_string_lossy().to_string();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
    }

    /// Checks the configuration for consistency.
    pub fn validate(&self) -> Result<(), String> {
        let ws = parse_address("WebSocket", &self.server.ws_bind_address)?;
        let http = parse_address("HTTP", &self.server.http_bind_address)?;
        if ws == http && ws.port() != 0 {
            return Err(format!(
                "WebSocket and HTTP endpoints cannot share {}",
                ws
            ));
        }

        if self.static_files.document_root.is_empty() {
            return Err("Document root cannot be empty".to_string());
        }
        for (name, document) in [
            ("Index document", &self.static_files.index_document),
            ("Not-found document", &self.static_files.not_found_document),
        ] {
            if document.is_empty() {
                return Err(format!("{name} cannot be empty"));
            }
            if document.contains('/') || document.contains('\\') {
                return Err(format!("{name} must be a file name, got {document}"));
            }
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, VALID_LOG_LEVELS
            ));
        }

        Ok(())
    }

    /// Converts to the relay server's configuration.
    pub fn to_server_config(&self) -> Result<ServerConfig, String> {
        Ok(ServerConfig {
            ws_bind_address: parse_address("WebSocket", &self.server.ws_bind_address)?,
            http_bind_address: parse_address("HTTP", &self.server.http_bind_address)?,
            document_root: PathBuf::from(&self.static_files.document_root),
            index_document: self.static_files.index_document.clone(),
            not_found_document: self.static_files.not_found_document.clone(),
        })
    }
}

fn parse_address(kind: &str, address: &str) -> Result<SocketAddr, String> {
    address
        .parse()
        .map_err(|_| format!("Invalid {kind} bind address: {address}"))
}
