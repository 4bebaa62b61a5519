//! Line-stream transport: newline-delimited JSON-RPC over a child process.
//!
//! The transport owns a long-lived server subprocess. Requests and
//! notifications are written to its stdin as one JSON line each; a spawned
//! reader task accumulates stdout bytes, extracts complete lines, and
//! offers decoded responses to the [`Correlator`]. Callers get a
//! synchronous-looking request/response API over the asynchronous channel:
//! [`StdioTransport::call`] suspends until correlation or timeout.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::codec::{self, Decoded, LineBuffer};
use crate::correlator::Correlator;
use crate::error::{McpError, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Default wait for a matching response.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for spawning a stream-transport server process.
///
/// The server binary location is an explicit field here rather than any
/// process-wide setting; two transports may point at different binaries.
#[derive(Debug, Clone)]
pub struct StdioConfig {
    /// Command to spawn.
    pub command: String,
    /// Arguments to pass to the command.
    pub args: Vec<String>,
    /// Environment variables to set for the child.
    pub env: Vec<(String, String)>,
    /// Working directory for the child.
    pub working_dir: Option<PathBuf>,
    /// Default timeout applied by [`StdioTransport::call`].
    pub call_timeout: Duration,
}

impl StdioConfig {
    /// Create a config for the given server command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            working_dir: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Replace the argument list.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Add an environment variable.
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the child's working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the default call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

/// Transport speaking newline-framed JSON-RPC to a child process.
pub struct StdioTransport {
    stdin: AsyncMutex<Option<ChildStdin>>,
    child: AsyncMutex<Child>,
    correlator: Correlator,
    reader: JoinHandle<()>,
    stderr_drain: JoinHandle<()>,
    call_timeout: Duration,
}

impl StdioTransport {
    /// Spawn the server process and start the read loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: StdioConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            McpError::spawn_failed(format!("failed to spawn '{}': {}", config.command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::spawn_failed("failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::spawn_failed("failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| McpError::spawn_failed("failed to capture stderr"))?;

        let correlator = Correlator::new();
        let reader = tokio::spawn(read_loop(stdout, correlator.clone()));
        let stderr_drain = tokio::spawn(drain_stderr(stderr));

        tracing::info!(
            command = %config.command,
            "spawned MCP server via stream transport"
        );

        Ok(Self {
            stdin: AsyncMutex::new(Some(stdin)),
            child: AsyncMutex::new(child),
            correlator,
            reader,
            stderr_drain,
            call_timeout: config.call_timeout,
        })
    }

    /// Write a request line to the server without waiting for a response.
    pub async fn send(&self, request: &JsonRpcRequest) -> Result<()> {
        let line = codec::encode(request)?;
        tracing::trace!(id = %request.id, method = %request.method, "sending request");
        self.write_line(&line).await
    }

    /// Write a notification line. No correlation is registered; the server
    /// will never answer it.
    pub async fn send_notification(&self, notification: &JsonRpcNotification) -> Result<()> {
        let line = codec::encode(notification)?;
        tracing::trace!(method = %notification.method, "sending notification");
        self.write_line(&line).await
    }

    /// Send a request and wait for its response with the configured
    /// default timeout.
    pub async fn call(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        self.call_with_timeout(request, self.call_timeout).await
    }

    /// Send a request and wait up to `timeout` for the response whose id
    /// matches, regardless of what else arrives in between.
    pub async fn call_with_timeout(
        &self,
        request: &JsonRpcRequest,
        timeout: Duration,
    ) -> Result<JsonRpcResponse> {
        let wait = self.correlator.begin_wait(request.id.clone())?;
        if let Err(e) = self.send(request).await {
            self.correlator.forget(wait.id());
            return Err(e);
        }
        wait.wait(timeout).await
    }

    /// Whether the server process is still running.
    pub async fn is_connected(&self) -> bool {
        matches!(self.child.lock().await.try_wait(), Ok(None))
    }

    /// Close both stream directions, stop the server process, and fail
    /// every pending correlation.
    pub async fn shutdown(&self) -> Result<()> {
        self.stdin.lock().await.take();
        self.reader.abort();
        self.stderr_drain.abort();
        {
            let mut child = self.child.lock().await;
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        self.correlator.cancel_all("transport shut down");
        tracing::info!("stream transport shut down");
        Ok(())
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| McpError::connection_closed("transport shut down"))?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.reader.abort();
        self.stderr_drain.abort();
        // kill_on_drop reaps the child.
        self.correlator.cancel_all("transport dropped");
    }
}

/// Consume server stdout: accumulate chunks, extract lines, filter noise,
/// decode, and offer responses to the correlator.
///
/// A single message may span multiple reads and one read may carry
/// multiple messages; [`LineBuffer`] absorbs both. Malformed lines are
/// logged and dropped; the stream continues.
async fn read_loop(mut stdout: ChildStdout, correlator: Correlator) {
    let mut buffer = LineBuffer::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stdout.read(&mut chunk).await {
            Ok(0) => {
                correlator.cancel_all("server stdout closed");
                break;
            }
            Ok(n) => {
                for line in buffer.push(&chunk[..n]) {
                    if codec::is_noise(&line) {
                        continue;
                    }
                    match codec::decode(&line) {
                        Decoded::Response(response) => {
                            correlator.offer(response);
                        }
                        Decoded::Notification(notification) => {
                            tracing::debug!(
                                method = %notification.method,
                                "ignoring server notification"
                            );
                        }
                        Decoded::Request(request) => {
                            tracing::debug!(
                                method = %request.method,
                                "ignoring server-initiated request"
                            );
                        }
                        Decoded::Malformed => {
                            tracing::warn!(line = %line, "dropping malformed line");
                        }
                    }
                }
            }
            Err(e) => {
                correlator.cancel_all(&format!("read error: {}", e));
                break;
            }
        }
    }
}

/// Forward server stderr into tracing for diagnostics.
async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(line = %line, "server stderr");
    }
}
