//! HTTP session transport: one JSON-RPC envelope per POST.
//!
//! The server behind this transport is stateless per connection, so MCP
//! binds calls to negotiated state with an opaque session token: the
//! `initialize` response carries it in the `Mcp-Session-Id` header, and
//! every later request and notification must echo it back. Each call is a
//! complete exchange: there is no correlation wait; the decoded response
//! is stored in a per-id log and returned directly.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use url::Url;

use crate::codec;
use crate::error::{McpError, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId};

/// Header carrying the opaque session token.
pub const MCP_SESSION_HEADER: &str = "Mcp-Session-Id";

/// Default timeout for one HTTP exchange.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the HTTP session transport.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL of the MCP server; the transport POSTs to `<base>/mcp`.
    pub base_url: String,
    /// Timeout for each HTTP exchange.
    pub timeout: Duration,
}

impl HttpConfig {
    /// Create a config for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Set the per-exchange timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Per-session state: the token and the response log.
#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    responses: HashMap<RequestId, JsonRpcResponse>,
}

/// Transport carrying JSON-RPC envelopes over individual HTTP exchanges.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    session: Mutex<SessionState>,
}

impl HttpTransport {
    /// Create the transport. Performs no I/O; the session starts
    /// uninitialized.
    pub fn connect(config: HttpConfig) -> Result<Self> {
        let mut base = Url::parse(&config.base_url)
            .map_err(|e| McpError::transport(format!("invalid URL: {}", e)))?;
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let endpoint = base
            .join("mcp")
            .map_err(|e| McpError::transport(format!("invalid URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| McpError::transport(format!("failed to build HTTP client: {}", e)))?;

        tracing::info!(endpoint = %endpoint, "created HTTP session transport");

        Ok(Self {
            client,
            endpoint,
            session: Mutex::new(SessionState::default()),
        })
    }

    /// The resolved endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The current session token, if `initialize` has completed.
    pub fn session_token(&self) -> Option<String> {
        self.session.lock().token.clone()
    }

    /// Whether a session token has been captured.
    pub fn is_active(&self) -> bool {
        self.session.lock().token.is_some()
    }

    /// POST a request and return its decoded response.
    ///
    /// Headers are computed fresh from current session state on every
    /// call: the session token is attached for every method except
    /// `initialize`, and any method other than `initialize` is rejected
    /// while no token is known. An `initialize` response carrying the
    /// session header sets the token before the body is processed. The
    /// decoded body is stored in the response log under the request's id.
    pub async fn call(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let initialize = request.method == "initialize";
        let token = self.session.lock().token.clone();

        let body = codec::encode(request)?;
        let mut post = self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if !initialize {
            let token = token.ok_or(McpError::SessionNotEstablished)?;
            post = post.header(MCP_SESSION_HEADER, token);
        }

        tracing::trace!(id = %request.id, method = %request.method, "sending HTTP request");

        let response = post
            .send()
            .await
            .map_err(|e| McpError::transport(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::transport(format!(
                "HTTP error {}: {}",
                status, body
            )));
        }

        if initialize {
            if let Some(value) = response.headers().get(MCP_SESSION_HEADER) {
                if let Ok(token) = value.to_str() {
                    self.session.lock().token = Some(token.to_string());
                    tracing::debug!("captured session token from initialize response");
                }
            }
        }

        let text = response
            .text()
            .await
            .map_err(|e| McpError::transport(format!("failed to read response body: {}", e)))?;
        let decoded: JsonRpcResponse = serde_json::from_str(&text)?;

        self.session
            .lock()
            .responses
            .insert(request.id.clone(), decoded.clone());

        Ok(decoded)
    }

    /// POST a notification. The session token must already be known; any
    /// response body is ignored.
    pub async fn send_notification(&self, notification: &JsonRpcNotification) -> Result<()> {
        let token = self
            .session
            .lock()
            .token
            .clone()
            .ok_or(McpError::SessionNotEstablished)?;

        let body = codec::encode(notification)?;
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header(MCP_SESSION_HEADER, token)
            .body(body)
            .send()
            .await
            .map_err(|e| McpError::transport(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(McpError::transport(format!(
                "HTTP error {}",
                response.status()
            )));
        }

        tracing::trace!(method = %notification.method, "sent HTTP notification");
        Ok(())
    }

    /// Look up the stored response for a request id. No I/O.
    pub fn fetch(&self, id: &RequestId) -> Option<JsonRpcResponse> {
        self.session.lock().responses.get(id).cloned()
    }

    /// End the session: drop the token and clear the response log.
    pub fn end_session(&self) {
        let mut session = self.session.lock();
        session.token = None;
        session.responses.clear();
        tracing::debug!("HTTP session ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder_sets_timeout() {
        let config = HttpConfig::new("http://localhost:8080").with_timeout(Duration::from_secs(3));
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn connect_resolves_mcp_endpoint() {
        let transport = HttpTransport::connect(HttpConfig::new("http://127.0.0.1:19876")).unwrap();
        assert_eq!(transport.endpoint().as_str(), "http://127.0.0.1:19876/mcp");

        let transport = HttpTransport::connect(HttpConfig::new("http://host/prefix")).unwrap();
        assert_eq!(transport.endpoint().as_str(), "http://host/prefix/mcp");
    }

    #[test]
    fn connect_rejects_invalid_url() {
        let err = HttpTransport::connect(HttpConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, McpError::Transport(_)));
    }

    #[tokio::test]
    async fn non_initialize_call_without_token_is_rejected() {
        let transport = HttpTransport::connect(HttpConfig::new("http://127.0.0.1:9")).unwrap();
        let request = JsonRpcRequest::new("tool-call-1", "tools/call", None);
        // Rejected before any network I/O happens.
        let err = transport.call(&request).await.unwrap_err();
        assert!(matches!(err, McpError::SessionNotEstablished));
    }

    #[tokio::test]
    async fn notification_without_token_is_rejected() {
        let transport = HttpTransport::connect(HttpConfig::new("http://127.0.0.1:9")).unwrap();
        let notification = JsonRpcNotification::new("notifications/initialized", None);
        let err = transport.send_notification(&notification).await.unwrap_err();
        assert!(matches!(err, McpError::SessionNotEstablished));
    }

    #[test]
    fn fetch_on_empty_log_returns_none() {
        let transport = HttpTransport::connect(HttpConfig::new("http://127.0.0.1:9")).unwrap();
        assert!(transport.fetch(&RequestId::from("init-1")).is_none());
        assert!(!transport.is_active());
    }
}
