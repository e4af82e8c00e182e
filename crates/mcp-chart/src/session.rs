//! Session negotiation.
//!
//! One `initialize` exchange yields the session token every later request
//! carries. The resulting [`Session`] is immutable; closing a client drops it.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use url::Url;

use crate::codec;
use crate::config::ClientConfig;
use crate::error::{McpError, Result};
use crate::ids::IdAllocator;
use crate::protocol::{
    ACCEPT_JSON_OR_STREAM, InitializeParams, JsonRpcRequest, SESSION_HEADER, ServerInfo, methods,
};

/// An established session with the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    base_url: String,
    endpoint_path: String,
    endpoint: Url,
}

impl Session {
    /// Build a session from a token and the address it was issued for.
    pub fn new(
        token: impl Into<String>,
        base_url: impl Into<String>,
        endpoint_path: impl Into<String>,
    ) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(McpError::session("session token is empty"));
        }
        let base_url = base_url.into();
        let endpoint_path = endpoint_path.into();
        let endpoint = crate::config::service_url(&base_url, &endpoint_path)?;
        Ok(Self {
            token,
            base_url,
            endpoint_path,
            endpoint,
        })
    }

    /// The opaque token assigned by the server.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint path appended to the base URL.
    pub fn endpoint_path(&self) -> &str {
        &self.endpoint_path
    }

    /// Full URL of the service endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Outcome of a successful negotiation.
#[derive(Debug, Clone)]
pub struct Negotiated {
    /// The new session.
    pub session: Session,
    /// Server identification, when the response body could be decoded.
    pub server_info: Option<ServerInfo>,
}

/// Perform the `initialize` handshake and read the session token header.
pub async fn negotiate(
    http: &reqwest::Client,
    config: &ClientConfig,
    ids: &dyn IdAllocator,
) -> Result<Negotiated> {
    let url = config.service_url()?;
    let params = InitializeParams::new(&config.client_name, &config.client_version);
    let request = JsonRpcRequest::new(
        ids.next_id(methods::INITIALIZE),
        methods::INITIALIZE,
        Some(serde_json::to_value(&params)?),
    );

    tracing::debug!(url = %url, client = %config.client_name, "negotiating MCP session");

    let mut builder = http
        .post(url.clone())
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, ACCEPT_JSON_OR_STREAM)
        .body(codec::encode(&request)?);
    if let Some(timeout) = config.request_timeout {
        builder = builder.timeout(timeout);
    }

    let response = builder.send().await.map_err(|e| {
        if e.is_timeout() {
            McpError::Timeout(config.request_timeout.unwrap_or_default())
        } else {
            McpError::Http(e)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(McpError::session(format!(
            "negotiation failed with HTTP {}: {}",
            status, body
        )));
    }

    let token = response
        .headers()
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    let body = response.bytes().await.ok();

    let Some(token) = token else {
        return Err(McpError::session(format!(
            "server did not return a {} header",
            SESSION_HEADER
        )));
    };

    let server_info = body.as_deref().and_then(server_info_from_body);
    match &server_info {
        Some(info) => tracing::info!(
            session = %token,
            server = %info.name,
            version = %info.version,
            "MCP session negotiated"
        ),
        None => tracing::info!(session = %token, "MCP session negotiated"),
    }

    Ok(Negotiated {
        session: Session::new(token, &config.server, &config.endpoint)?,
        server_info,
    })
}

/// Diagnostics only; any decode failure yields `None`.
fn server_info_from_body(body: &[u8]) -> Option<ServerInfo> {
    let message = match codec::decode_body(body) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(error = %e, "could not decode initialize response body");
            return None;
        }
    };
    let info = message.result?.get("serverInfo")?.clone();
    serde_json::from_value(info).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_accessors() {
        let session = Session::new("abc123", "http://localhost:11121", "/mcp-server-chart").unwrap();
        assert_eq!(session.token(), "abc123");
        assert_eq!(session.base_url(), "http://localhost:11121");
        assert_eq!(session.endpoint_path(), "/mcp-server-chart");
        assert_eq!(
            session.endpoint().as_str(),
            "http://localhost:11121/mcp-server-chart"
        );
    }

    #[test]
    fn test_session_requires_token() {
        let err = Session::new("", "http://localhost:11121", "/mcp").unwrap_err();
        assert!(err.is_session());
    }

    #[test]
    fn test_server_info_from_streamed_body() {
        let body = b"event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":\"req-1\",\"result\":{\"serverInfo\":{\"name\":\"mcp-server-chart\",\"version\":\"0.4.0\"}}}\n\n";
        let info = server_info_from_body(body).unwrap();
        assert_eq!(info.name, "mcp-server-chart");
        assert_eq!(info.version, "0.4.0");
    }

    #[test]
    fn test_server_info_is_optional() {
        assert!(server_info_from_body(b"garbage").is_none());
        assert!(server_info_from_body(b"{\"jsonrpc\":\"2.0\",\"id\":\"1\",\"result\":{}}").is_none());
    }
}
