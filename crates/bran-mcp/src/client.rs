//! Typed MCP client over either transport.
//!
//! Wraps a [`StdioTransport`] or [`HttpTransport`] and exposes the protocol
//! flow the harness needs: `initialize` (followed by the
//! `notifications/initialized` notification), `tools/list`, and
//! `tools/call`. Request ids are allocated as monotonic `req-N` strings.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::error::{McpError, Result};
use crate::http::{HttpConfig, HttpTransport};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, ListToolsResult, RequestId, ServerInfo, ToolInfo,
};
use crate::stdio::{StdioConfig, StdioTransport};

enum ClientTransport {
    Stdio(StdioTransport),
    Http(HttpTransport),
}

/// An MCP client connected to a single server.
pub struct McpClient {
    transport: ClientTransport,
    server_info: Option<ServerInfo>,
    initialized: bool,
    next_id: AtomicU64,
}

impl McpClient {
    /// Connect over the stream transport by spawning the server process.
    ///
    /// Does not perform the handshake; call [`McpClient::initialize`].
    pub fn stdio(config: StdioConfig) -> Result<Self> {
        Ok(Self::with_transport(ClientTransport::Stdio(
            StdioTransport::spawn(config)?,
        )))
    }

    /// Connect over the HTTP session transport.
    ///
    /// Does not perform the handshake; call [`McpClient::initialize`].
    pub fn http(config: HttpConfig) -> Result<Self> {
        Ok(Self::with_transport(ClientTransport::Http(
            HttpTransport::connect(config)?,
        )))
    }

    fn with_transport(transport: ClientTransport) -> Self {
        Self {
            transport,
            server_info: None,
            initialized: false,
            next_id: AtomicU64::new(1),
        }
    }

    /// Server identity, available after initialization.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Whether the handshake has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The HTTP transport, when connected over HTTP (for response-log
    /// lookups and session inspection).
    pub fn http_transport(&self) -> Option<&HttpTransport> {
        match &self.transport {
            ClientTransport::Http(transport) => Some(transport),
            ClientTransport::Stdio(_) => None,
        }
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Str(format!("req-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let request = JsonRpcRequest::new(self.next_request_id(), method, params);
        let response = match &self.transport {
            ClientTransport::Stdio(transport) => transport.call(&request).await?,
            ClientTransport::Http(transport) => transport.call(&request).await?,
        };
        response
            .into_result()
            .map_err(|e| McpError::server_error(e.code, e.message, e.data))
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = JsonRpcNotification::new(method, params);
        match &self.transport {
            ClientTransport::Stdio(transport) => transport.send_notification(&notification).await,
            ClientTransport::Http(transport) => transport.send_notification(&notification).await,
        }
    }

    /// Perform the MCP handshake: send `initialize`, then the
    /// `notifications/initialized` notification. Idempotent.
    pub async fn initialize(&mut self) -> Result<&ServerInfo> {
        if self.initialized {
            return self.server_info.as_ref().ok_or(McpError::NotInitialized);
        }

        let params = InitializeParams::default();
        let result = self
            .request("initialize", Some(serde_json::to_value(&params)?))
            .await?;
        let init: InitializeResult = serde_json::from_value(result)?;

        tracing::info!(
            server = %init.server_info.name,
            version = %init.server_info.version,
            protocol = %init.protocol_version,
            "MCP server initialized"
        );

        self.notify("notifications/initialized", None).await?;

        self.server_info = Some(init.server_info);
        self.initialized = true;
        self.server_info.as_ref().ok_or(McpError::NotInitialized)
    }

    /// List the tools the server exposes.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        if !self.initialized {
            return Err(McpError::NotInitialized);
        }

        let result = self.request("tools/list", None).await?;
        let list: ListToolsResult = serde_json::from_value(result)?;

        tracing::debug!(tool_count = list.tools.len(), "listed tools");
        Ok(list.tools)
    }

    /// Call a tool by name.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        if !self.initialized {
            return Err(McpError::NotInitialized);
        }

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let result = self
            .request("tools/call", Some(serde_json::to_value(&params)?))
            .await?;
        let call_result: CallToolResult = serde_json::from_value(result)?;

        if call_result.is_error() {
            tracing::warn!(tool = %name, "tool call returned error");
        } else {
            tracing::debug!(tool = %name, "tool call succeeded");
        }

        Ok(call_result)
    }

    /// Shut the connection down: stop the server process (stream) or end
    /// the session (HTTP).
    pub async fn shutdown(&self) -> Result<()> {
        match &self.transport {
            ClientTransport::Stdio(transport) => transport.shutdown().await,
            ClientTransport::Http(transport) => {
                transport.end_session();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stdio_connect_to_nonexistent_command_fails() {
        let result = McpClient::stdio(StdioConfig::new("nonexistent-mcp-server-12345"));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn operations_before_initialize_are_rejected() {
        let client = McpClient::http(HttpConfig::new("http://127.0.0.1:9")).unwrap();
        assert!(!client.is_initialized());

        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, McpError::NotInitialized));

        let err = client.call_tool("run-tests", None).await.unwrap_err();
        assert!(matches!(err, McpError::NotInitialized));
    }

    #[tokio::test]
    async fn http_transport_accessor_distinguishes_transports() {
        let client = McpClient::http(HttpConfig::new("http://127.0.0.1:9")).unwrap();
        assert!(client.http_transport().is_some());
    }
}
