//! Client configuration.
//!
//! Every field has a default so an external deployment tool only needs to
//! override what it assigns (usually the server URL and the reverse-proxied
//! endpoint path).

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::error::{McpError, Result};

/// Default server base URL.
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:11121";

/// Default endpoint path appended to the server URL.
pub const DEFAULT_ENDPOINT: &str = "/mcp-server-chart";

/// Default client name sent during negotiation.
pub const DEFAULT_CLIENT_NAME: &str = "mcp-chart-client";

/// Default client version sent during negotiation.
pub const DEFAULT_CLIENT_VERSION: &str = "1.0.0";

/// Configuration for an [`McpChartClient`](crate::McpChartClient).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server base URL, e.g. `http://charts.internal:11121`.
    pub server: String,
    /// Path appended verbatim to `server`.
    pub endpoint: String,
    /// Client name reported to the server.
    pub client_name: String,
    /// Client version reported to the server.
    pub client_version: String,
    /// Default deadline for each request. `None` waits indefinitely.
    #[serde(with = "optional_secs")]
    pub request_timeout: Option<Duration>,
    /// Per-tool default arguments, merged under caller arguments.
    pub tool_defaults: HashMap<String, Map<String, Value>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            client_version: DEFAULT_CLIENT_VERSION.to_string(),
            request_timeout: None,
            tool_defaults: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Create a config with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server base URL.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    /// Set the endpoint path.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the client name and version reported during negotiation.
    pub fn with_client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_name = name.into();
        self.client_version = version.into();
        self
    }

    /// Set the default per-request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Register default arguments for a tool.
    pub fn with_tool_defaults(mut self, tool: impl Into<String>, defaults: Map<String, Value>) -> Self {
        self.tool_defaults.insert(tool.into(), defaults);
        self
    }

    /// The full service URL: `server` followed by `endpoint`.
    pub fn service_url(&self) -> Result<Url> {
        service_url(&self.server, &self.endpoint)
    }
}

/// Join a server base URL and an endpoint path by concatenation.
///
/// `Url::join` would drop any path prefix on the server, which breaks
/// deployments behind a path-prefixed reverse proxy.
pub fn service_url(server: &str, endpoint: &str) -> Result<Url> {
    let server = server.trim_end_matches('/');
    if server.is_empty() {
        return Err(McpError::validation("server URL is empty"));
    }
    let endpoint = endpoint.trim();
    let joined = if endpoint.is_empty() || endpoint.starts_with('/') {
        format!("{}{}", server, endpoint)
    } else {
        format!("{}/{}", server, endpoint)
    };
    Ok(Url::parse(&joined)?)
}

mod optional_secs {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    /// Seconds as a number; zero, negative and absent all mean no timeout.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(secs) = Option::<f64>::deserialize(deserializer)?.filter(|s| *s > 0.0) else {
            return Ok(None);
        };
        Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(|e| D::Error::custom(format!("request_timeout {} out of range: {}", secs, e)))
    }
}
