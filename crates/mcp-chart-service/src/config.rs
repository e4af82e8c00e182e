//! Service configuration.
//!
//! Values come from three layers: command-line flags (or their environment
//! variables), an optional TOML file, then built-in defaults.
//!
//! ```toml
//! [client]
//! server = "http://charts.internal:11121"
//! endpoint = "/mcp-server-chart"
//! request_timeout = 30
//!
//! [client.tool_defaults.generate_pie_chart]
//! innerRadius = 0.6
//!
//! [service]
//! port = 3000
//! path_prefix = "/mcp-chart-service"
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;
use mcp_chart::ClientConfig;
use serde::Deserialize;

use crate::error::ConfigError;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default path prefix under which a reverse proxy forwards requests.
pub const DEFAULT_PATH_PREFIX: &str = "/mcp-chart-service";

/// Chart service: renders charts through a remote MCP chart server.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "mcp-chart-service")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// MCP chart server base URL
    #[arg(long, env = "MCP_CHART_SERVER")]
    pub server: Option<String>,

    /// Endpoint path on the MCP chart server
    #[arg(long, env = "MCP_CHART_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Path prefix the service is also reachable under
    #[arg(long, env = "MCP_CHART_PATH_PREFIX")]
    pub path_prefix: Option<String>,

    /// TOML config file with [client] and [service] sections
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for daily-rotated JSON logs
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// On-disk config file layout.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// MCP client settings.
    pub client: ClientConfig,
    /// HTTP listener settings.
    pub service: ServiceSection,
}

/// `[service]` section of the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub port: Option<u16>,
    pub path_prefix: Option<String>,
}

impl ConfigFile {
    /// Parse a config file from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }
}

/// Resolved service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Port to listen on.
    pub port: u16,
    /// Normalized path prefix (`/name`, no trailing slash), or empty.
    pub path_prefix: String,
    /// Settings for the per-request MCP client.
    pub client: ClientConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            client: ClientConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Create a config for the given client settings with default listener values.
    pub fn new(client: ClientConfig) -> Self {
        Self {
            client,
            ..Self::default()
        }
    }

    /// Set the path prefix.
    pub fn with_path_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.path_prefix = normalize_prefix(prefix.as_ref());
        self
    }

    /// Resolve the final config from parsed arguments, loading `--config` if given.
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        Self::merge(args, file)
    }

    /// Layer arguments over a config file over defaults.
    pub fn merge(args: &Args, file: ConfigFile) -> Result<Self, ConfigError> {
        let mut client = file.client;
        if let Some(server) = &args.server {
            client.server = server.clone();
        }
        if let Some(endpoint) = &args.endpoint {
            client.endpoint = endpoint.clone();
        }
        client
            .service_url()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let port = args.port.or(file.service.port).unwrap_or(DEFAULT_PORT);
        let prefix = args
            .path_prefix
            .as_deref()
            .or(file.service.path_prefix.as_deref())
            .unwrap_or(DEFAULT_PATH_PREFIX);

        Ok(Self {
            port,
            path_prefix: normalize_prefix(prefix),
            client,
        })
    }
}

/// Ensure a leading `/` and strip trailing ones; `/` and empty become empty.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::merge(&Args::default(), ConfigFile::default()).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.path_prefix, "/mcp-chart-service");
        assert_eq!(config.client, ClientConfig::default());
    }

    #[test]
    fn test_args_override_file() {
        let file = ConfigFile::from_toml(
            r#"
            [client]
            server = "http://from-file:1"
            endpoint = "/file-endpoint"

            [service]
            port = 8000
            path_prefix = "charts/"
            "#,
        )
        .unwrap();
        let args = Args {
            port: Some(9000),
            server: Some("http://from-args:2".to_string()),
            ..Args::default()
        };

        let config = ServiceConfig::merge(&args, file).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.client.server, "http://from-args:2");
        assert_eq!(config.client.endpoint, "/file-endpoint");
        assert_eq!(config.path_prefix, "/charts");
    }

    #[test]
    fn test_invalid_server_is_rejected() {
        let args = Args {
            server: Some(String::new()),
            ..Args::default()
        };
        let err = ServiceConfig::merge(&args, ConfigFile::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_mistyped_value_is_parse_error() {
        let err = ConfigFile::from_toml("[client]\nserver = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_out_of_range_timeout_is_parse_error() {
        for value in ["inf", "1e20"] {
            let err = ConfigFile::from_toml(&format!("[client]\nrequest_timeout = {}\n", value))
                .unwrap_err();
            assert!(matches!(err, ConfigError::Parse(_)), "accepted {}", value);
        }
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/mcp-chart-service"), "/mcp-chart-service");
        assert_eq!(normalize_prefix("mcp-chart-service/"), "/mcp-chart-service");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(""), "");
    }

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from([
            "mcp-chart-service",
            "--port",
            "4000",
            "--path-prefix",
            "/charts",
            "--verbose",
        ]);
        assert_eq!(args.port, Some(4000));
        assert_eq!(args.path_prefix.as_deref(), Some("/charts"));
        assert!(args.verbose);
    }
}
