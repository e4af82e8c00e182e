//! MCP client for a remote chart generation service.
//!
//! The service speaks JSON-RPC 2.0 over HTTP with a streamed event channel
//! (MCP "streamable HTTP"). This crate negotiates a session, keeps the
//! notification stream open, discovers the callable tools and invokes them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  McpChartClient                                             │
//! │  - Unbound → Negotiating → Active → Closed                  │
//! │  - validates tool names, merges default arguments           │
//! └─────────────────────────────────────────────────────────────┘
//!        │                 │                    │
//!        ▼                 ▼                    ▼
//! ┌──────────────┐ ┌────────────────┐ ┌───────────────────────┐
//! │ session      │ │ dispatch       │ │ stream                │
//! │ initialize,  │ │ POST + reply   │ │ long-lived GET,       │
//! │ token header │ │ in same body   │ │ frames → EventBus     │
//! └──────────────┘ └────────────────┘ └───────────────────────┘
//!                          │                    │
//!                          ▼                    ▼
//!                  ┌─────────────────────────────────┐
//!                  │ codec: `data:` frames / JSON    │
//!                  └─────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use mcp_chart::{ClientConfig, McpChartClient};
//! use serde_json::json;
//!
//! let client = McpChartClient::new(
//!     ClientConfig::default().with_server("http://charts.internal:11121"),
//! )?;
//! let ready = client.connect().await?;
//! println!("session {} with {} tools", ready.session_id, ready.tools_count);
//!
//! let params = json!({
//!     "data": [{"category": "A", "value": 63}, {"category": "B", "value": 37}],
//!     "title": "Channels",
//! });
//! let url = client
//!     .invoke("generate_pie_chart", params.as_object().cloned().unwrap_or_default())
//!     .await?;
//! println!("chart at {}", url);
//!
//! client.close();
//! ```
//!
//! Replies are read from the response body of the request that produced
//! them; the notification stream only carries server-pushed events.

pub mod client;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod ids;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod stream;

// Re-export main types
pub use client::{ConnectionState, McpChartClient, ReadyInfo, invoke_once, merge_params};
pub use codec::{Frame, FrameDecoder};
pub use config::ClientConfig;
pub use dispatch::{CallOptions, Dispatcher};
pub use error::{McpError, Result};
pub use events::{ClientEvent, EventBus, EventKind, EventSubscriber};
pub use ids::{CounterIds, IdAllocator, UuidIds};
pub use protocol::{
    CallToolParams, CallToolResult, JsonRpcError, JsonRpcMessage, JsonRpcRequest, ServerInfo,
    ToolContent, ToolInfo,
};
pub use registry::ToolRegistry;
pub use session::{Negotiated, Session};
pub use stream::Subscription;
pub use tokio_util::sync::CancellationToken;
