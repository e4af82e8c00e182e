//! Request dispatch.
//!
//! Every call is one independent HTTP exchange: the request envelope goes out
//! as a POST and the reply is read from that same response body. Replies are
//! never expected on the subscription stream, so concurrent calls need no
//! shared pending-call table.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::error::{McpError, Result};
use crate::ids::IdAllocator;
use crate::protocol::{ACCEPT_JSON_OR_STREAM, JsonRpcRequest, SESSION_HEADER};
use crate::session::Session;

/// Per-call deadline and cancellation.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Deadline for the whole exchange. Expiry fails with [`McpError::Timeout`].
    pub timeout: Option<Duration>,
    /// Cancelling this token fails the call with [`McpError::Cancelled`].
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    /// No deadline, no cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Sends JSON-RPC requests and resolves each against its own response.
#[derive(Clone)]
pub struct Dispatcher {
    http: reqwest::Client,
    ids: Arc<dyn IdAllocator>,
}

impl Dispatcher {
    /// Create a dispatcher over a shared HTTP client.
    pub fn new(http: reqwest::Client, ids: Arc<dyn IdAllocator>) -> Self {
        Self { http, ids }
    }

    /// The id allocator used for outgoing requests.
    pub fn ids(&self) -> &dyn IdAllocator {
        self.ids.as_ref()
    }

    /// Call `method` and wait for its result.
    ///
    /// An `error` envelope always settles the call as [`McpError::Rpc`].
    pub async fn call(
        &self,
        session: &Session,
        method: &str,
        params: Option<Value>,
        options: &CallOptions,
    ) -> Result<Value> {
        let request = JsonRpcRequest::new(self.ids.next_id(method), method, params);

        let exchange = async {
            match options.timeout {
                Some(timeout) => tokio::time::timeout(timeout, self.exchange(session, &request))
                    .await
                    .map_err(|_| McpError::Timeout(timeout))?,
                None => self.exchange(session, &request).await,
            }
        };

        let outcome = match &options.cancel {
            Some(cancel) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(McpError::Cancelled),
                    outcome = exchange => outcome,
                }
            }
            None => exchange.await,
        };

        if let Err(e) = &outcome {
            tracing::debug!(method = %method, id = %request.id, error = %e, "MCP call failed");
        }
        outcome
    }

    async fn exchange(&self, session: &Session, request: &JsonRpcRequest) -> Result<Value> {
        let body = codec::encode(request)?;

        tracing::trace!(
            url = %session.endpoint(),
            method = %request.method,
            id = %request.id,
            "sending MCP request"
        );

        let response = self
            .http
            .post(session.endpoint().clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, ACCEPT_JSON_OR_STREAM)
            .header(SESSION_HEADER, session.token())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::transport(format!("HTTP error {}: {}", status, body)));
        }

        let bytes = response.bytes().await?;
        tracing::trace!(
            id = %request.id,
            body = %String::from_utf8_lossy(&bytes),
            "received MCP response"
        );

        let message = codec::decode_body(&bytes)?;

        if let Some(reply_id) = message.id_string()
            && reply_id != request.id
        {
            tracing::warn!(
                id = %request.id,
                reply_id = %reply_id,
                "response id does not match request id"
            );
        }

        if let Some(error) = message.error {
            tracing::warn!(
                method = %request.method,
                id = %request.id,
                code = error.code,
                message = %error.message,
                "MCP server returned an error"
            );
            return Err(error.into());
        }

        message
            .result
            .ok_or_else(|| McpError::parse("response carries neither result nor error"))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_options_builder() {
        let token = CancellationToken::new();
        let options = CallOptions::new()
            .with_timeout(Duration::from_secs(5))
            .with_cancel(token.clone());

        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
        token.cancel();
        assert!(options.cancel.unwrap().is_cancelled());
    }

    #[test]
    fn test_default_options_wait_indefinitely() {
        let options = CallOptions::default();
        assert!(options.timeout.is_none());
        assert!(options.cancel.is_none());
    }
}
