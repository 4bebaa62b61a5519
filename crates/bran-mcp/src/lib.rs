//! JSON-RPC correlation client for BDD test-runner MCP servers.
//!
//! This crate drives an MCP server that packages a BDD test runner as a
//! callable tool. It speaks JSON-RPC 2.0 over two transports and owns the
//! one genuinely stateful piece of the protocol: matching asynchronous
//! responses back to the request that produced them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  McpClient                                                  │
//! │  - initialize / tools/list / tools/call                     │
//! │  - allocates request ids, gates on handshake state          │
//! └───────────────┬─────────────────────────────┬───────────────┘
//!                 ▼                             ▼
//! ┌───────────────────────────┐   ┌─────────────────────────────┐
//! │  StdioTransport           │   │  HttpTransport              │
//! │  - newline-framed lines   │   │  - one envelope per POST    │
//! │  - LineBuffer + reader    │   │  - Mcp-Session-Id capture   │
//! │  - Correlator wait/offer  │   │  - per-id response log      │
//! └───────────────────────────┘   └─────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use bran_mcp::{McpClient, StdioConfig};
//!
//! let config = StdioConfig::new("behat-mcp-server")
//!     .with_working_dir("/path/to/project");
//!
//! let mut client = McpClient::stdio(config)?;
//! client.initialize().await?;
//!
//! let result = client
//!     .call_tool("run-tests", Some(serde_json::json!({"suite": "calculator"})))
//!     .await?;
//! println!("{}", result.text().unwrap_or_default());
//! ```
//!
//! # Protocol flow
//!
//! 1. Client sends `initialize` with protocol version and client info
//! 2. Server responds with its capabilities (and, over HTTP, the session
//!    token header)
//! 3. Client sends `notifications/initialized`
//! 4. Client can now call `tools/list` and `tools/call`
//!
//! Over the stream transport, messages are newline-delimited JSON; blank
//! lines and the literal `0` are transport noise. Over HTTP every call is
//! one POST to `<base>/mcp` and must carry the session token after
//! initialization.

pub mod client;
pub mod codec;
pub mod correlator;
pub mod error;
pub mod http;
pub mod protocol;
pub mod stdio;

// Re-export main types
pub use client::McpClient;
pub use codec::{Decoded, LineBuffer};
pub use correlator::{Correlator, PendingWait};
pub use error::{McpError, Result};
pub use http::{HttpConfig, HttpTransport, MCP_SESSION_HEADER};
pub use protocol::{
    CallToolParams, CallToolResult, ClientCapabilities, ClientInfo, InitializeParams,
    InitializeResult, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, RequestId, ServerCapabilities, ServerInfo, ToolContent, ToolInfo,
    JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
pub use stdio::{StdioConfig, StdioTransport, DEFAULT_CALL_TIMEOUT};
