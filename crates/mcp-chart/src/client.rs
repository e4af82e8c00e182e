//! MCP chart client: session lifecycle and tool invocation.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::config::ClientConfig;
use crate::dispatch::{CallOptions, Dispatcher};
use crate::error::{McpError, Result};
use crate::events::{ClientEvent, EventBus, EventKind, EventSubscriber};
use crate::ids::{CounterIds, IdAllocator};
use crate::protocol::{CallToolParams, CallToolResult, ServerInfo, ToolInfo, methods};
use crate::registry::ToolRegistry;
use crate::session::{self, Session};
use crate::stream::{self, Subscription};

/// Observable lifecycle state of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected.
    Unbound,
    /// `connect()` is in progress.
    Negotiating,
    /// Session negotiated and notification stream open.
    Active,
    /// Closed; `connect()` may be called again.
    Closed,
}

enum Phase {
    Unbound,
    Negotiating,
    Active {
        session: Arc<Session>,
        subscription: Subscription,
        server_info: Option<ServerInfo>,
    },
    Closed,
}

impl Phase {
    fn state(&self) -> ConnectionState {
        match self {
            Self::Unbound => ConnectionState::Unbound,
            Self::Negotiating => ConnectionState::Negotiating,
            Self::Active { .. } => ConnectionState::Active,
            Self::Closed => ConnectionState::Closed,
        }
    }
}

/// Summary returned by a successful [`McpChartClient::connect`].
#[derive(Debug, Clone)]
pub struct ReadyInfo {
    /// Session token.
    pub session_id: String,
    /// Number of tools the server advertised.
    pub tools_count: usize,
    /// Server identification, when the server reported it.
    pub server_info: Option<ServerInfo>,
}

/// Client for a remote MCP chart service.
///
/// Lifecycle: `Unbound → Negotiating → Active → Closed`. Requests are only
/// accepted while `Active`. All methods take `&self`, so one client can be
/// shared behind an `Arc` by concurrent callers.
pub struct McpChartClient {
    config: ClientConfig,
    http: reqwest::Client,
    dispatcher: Dispatcher,
    registry: ToolRegistry,
    events: EventBus,
    phase: Mutex<Phase>,
}

impl McpChartClient {
    /// Create an unbound client.
    ///
    /// This validates the configuration but does NOT contact the server;
    /// call [`connect`](Self::connect) for that.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("{}/{}", config.client_name, config.client_version))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Self::with_http_client(config, http)
    }

    /// Create an unbound client over an existing HTTP client.
    ///
    /// The HTTP client must not carry a global timeout, since the
    /// notification stream stays open for the whole session.
    pub fn with_http_client(config: ClientConfig, http: reqwest::Client) -> Result<Self> {
        let url = config.service_url()?;

        tracing::debug!(url = %url, client = %config.client_name, "created MCP chart client");

        Ok(Self {
            dispatcher: Dispatcher::new(http.clone(), Arc::new(CounterIds::default())),
            config,
            http,
            registry: ToolRegistry::new(),
            events: EventBus::default(),
            phase: Mutex::new(Phase::Unbound),
        })
    }

    /// Replace the request id allocator.
    pub fn with_id_allocator(mut self, ids: Arc<dyn IdAllocator>) -> Self {
        self.dispatcher = Dispatcher::new(self.http.clone(), ids);
        self
    }

    /// Replace the event bus with one buffering `capacity` events per subscriber.
    ///
    /// Call before subscribing; earlier subscribers stay on the old bus.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.events = EventBus::new(capacity);
        self
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.phase.lock().state()
    }

    /// Server identification from the last negotiation.
    pub fn server_info(&self) -> Option<ServerInfo> {
        match &*self.phase.lock() {
            Phase::Active { server_info, .. } => server_info.clone(),
            _ => None,
        }
    }

    /// The active session.
    pub fn session(&self) -> Result<Arc<Session>> {
        match &*self.phase.lock() {
            Phase::Active { session, .. } => Ok(session.clone()),
            other => Err(McpError::session(format!(
                "client is {:?}, not active",
                other.state()
            ))),
        }
    }

    /// The tool registry.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Subscribe to every client event.
    pub fn events(&self) -> EventSubscriber {
        self.events.subscribe()
    }

    /// Subscribe to selected event kinds.
    pub fn events_of(&self, kinds: &[EventKind]) -> EventSubscriber {
        self.events.subscribe_to(kinds)
    }

    fn default_options(&self) -> CallOptions {
        CallOptions {
            timeout: self.config.request_timeout,
            cancel: None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Negotiate a session, open the notification stream and list tools.
    ///
    /// Allowed from `Unbound` and `Closed`. On failure the client ends up
    /// `Closed` with nothing left open.
    pub async fn connect(&self) -> Result<ReadyInfo> {
        {
            let mut phase = self.phase.lock();
            match phase.state() {
                ConnectionState::Unbound | ConnectionState::Closed => *phase = Phase::Negotiating,
                ConnectionState::Negotiating => {
                    return Err(McpError::session("connect already in progress"));
                }
                ConnectionState::Active => {
                    return Err(McpError::session("client already connected"));
                }
            }
        }
        let mut guard = NegotiatingGuard {
            phase: &self.phase,
            armed: true,
        };

        let negotiated =
            session::negotiate(&self.http, &self.config, self.dispatcher.ids()).await?;
        let session = Arc::new(negotiated.session);
        let subscription = stream::subscribe(&self.http, &session, self.events.clone()).await?;

        {
            let mut phase = self.phase.lock();
            if !matches!(*phase, Phase::Negotiating) {
                guard.armed = false;
                drop(phase);
                subscription.unsubscribe();
                return Err(McpError::session("client closed during connect"));
            }
            *phase = Phase::Active {
                session: session.clone(),
                subscription,
                server_info: negotiated.server_info.clone(),
            };
        }
        guard.armed = false;

        let tools = match self
            .registry
            .refresh(&self.dispatcher, &session, &self.default_options())
            .await
        {
            Ok(tools) => tools,
            Err(e) => {
                self.close();
                return Err(e);
            }
        };

        let ready = ReadyInfo {
            session_id: session.token().to_string(),
            tools_count: tools.len(),
            server_info: negotiated.server_info,
        };
        tracing::info!(
            session = %ready.session_id,
            tools = ready.tools_count,
            "MCP chart client ready"
        );
        self.events.publish(ClientEvent::Ready {
            session_id: ready.session_id.clone(),
            tools_count: ready.tools_count,
        });
        Ok(ready)
    }

    /// Tear down the stream and forget the session.
    ///
    /// Idempotent and safe to call concurrently; only the first call on an
    /// active client touches the connection.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.phase.lock(), Phase::Closed);
        match previous {
            Phase::Active {
                session,
                subscription,
                ..
            } => {
                subscription.unsubscribe();
                self.registry.clear();
                tracing::info!(session = %session.token(), "MCP chart client closed");
            }
            Phase::Closed => {}
            Phase::Unbound | Phase::Negotiating => {
                tracing::debug!("MCP chart client closed before becoming active");
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Requests
    // ─────────────────────────────────────────────────────────────────────────

    /// Send a raw JSON-RPC call on the active session.
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        options: &CallOptions,
    ) -> Result<Value> {
        let session = self.session()?;
        self.dispatcher.call(&session, method, params, options).await
    }

    /// Re-fetch the tool list, replacing the registry contents.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        let session = self.session()?;
        self.registry
            .refresh(&self.dispatcher, &session, &self.default_options())
            .await
    }

    /// Invoke a tool and return the artifact URL it produced.
    ///
    /// `params` are merged over the configured defaults for `tool`.
    pub async fn invoke(&self, tool: &str, params: Map<String, Value>) -> Result<String> {
        self.invoke_with(tool, params, &self.default_options()).await
    }

    /// [`invoke`](Self::invoke) with an explicit deadline or cancellation.
    pub async fn invoke_with(
        &self,
        tool: &str,
        params: Map<String, Value>,
        options: &CallOptions,
    ) -> Result<String> {
        if tool.trim().is_empty() {
            return Err(McpError::validation("tool name is required"));
        }
        let session = self.session()?;
        if !self.registry.has(tool) {
            return Err(McpError::validation(format!("unknown tool '{}'", tool)));
        }

        let arguments = match self.config.tool_defaults.get(tool) {
            Some(defaults) => merge_params(defaults, params),
            None => params,
        };
        let call = CallToolParams {
            name: tool.to_string(),
            arguments,
        };

        let result = self
            .dispatcher
            .call(
                &session,
                methods::TOOLS_CALL,
                Some(serde_json::to_value(&call)?),
                options,
            )
            .await?;

        let result: CallToolResult = serde_json::from_value(result)
            .map_err(|e| McpError::result_shape(format!("malformed tool result: {}", e)))?;

        if result.is_error() {
            tracing::warn!(tool = %tool, "tool call returned error");
            return Err(McpError::tool_error(result.text()));
        }

        let url = result
            .first_text()
            .ok_or_else(|| McpError::result_shape("tool result has no text in its first item"))?;

        tracing::debug!(tool = %tool, url = %url, "tool call succeeded");
        Ok(url.to_string())
    }
}

impl Drop for McpChartClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for McpChartClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpChartClient")
            .field("server", &self.config.server)
            .field("endpoint", &self.config.endpoint)
            .field("state", &self.state())
            .field("tools", &self.registry.len())
            .finish()
    }
}

/// Resets `Negotiating` to `Closed` if `connect()` bails out or is dropped.
struct NegotiatingGuard<'a> {
    phase: &'a Mutex<Phase>,
    armed: bool,
}

impl Drop for NegotiatingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut phase = self.phase.lock();
        if matches!(*phase, Phase::Negotiating) {
            *phase = Phase::Closed;
        }
    }
}

/// Merge caller arguments over defaults; caller values win on collision.
pub fn merge_params(defaults: &Map<String, Value>, overrides: Map<String, Value>) -> Map<String, Value> {
    let mut merged = defaults.clone();
    merged.extend(overrides);
    merged
}

/// Connect, invoke one tool, and close, whatever the outcome.
pub async fn invoke_once(
    config: ClientConfig,
    tool: &str,
    params: Map<String, Value>,
) -> Result<String> {
    let client = McpChartClient::new(config)?;
    let outcome = async {
        client.connect().await?;
        client.invoke(tool, params).await
    }
    .await;
    client.close();
    outcome
}
