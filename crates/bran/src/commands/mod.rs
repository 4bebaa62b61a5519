//! Command handlers for the bran CLI.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use bran_mcp::{HttpConfig, McpClient, StdioConfig};

pub mod run;
pub mod tools;

/// Shared context passed to command handlers.
pub struct Context {
    /// Output as JSON instead of human-readable text.
    pub json_output: bool,
}

/// Server connection options shared by all commands.
#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Server command to spawn (stream transport)
    #[arg(long, env = "BRAN_SERVER_BIN", conflicts_with = "url")]
    pub server_bin: Option<String>,

    /// Server base URL (HTTP transport)
    #[arg(long, env = "BRAN_SERVER_URL")]
    pub url: Option<String>,

    /// Additional argument for the spawned server (repeatable)
    #[arg(long = "server-arg")]
    pub server_args: Vec<String>,

    /// Working directory for the spawned server
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Per-call timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub timeout_secs: u64,
}

impl ServerArgs {
    /// Connect over the selected transport and complete the handshake.
    pub async fn connect(&self) -> Result<McpClient> {
        let timeout = Duration::from_secs(self.timeout_secs);

        let mut client = if let Some(url) = &self.url {
            tracing::debug!(url = %url, "connecting over HTTP transport");
            McpClient::http(HttpConfig::new(url).with_timeout(timeout))?
        } else if let Some(bin) = &self.server_bin {
            tracing::debug!(command = %bin, "connecting over stream transport");
            let mut config = StdioConfig::new(bin)
                .with_args(self.server_args.clone())
                .with_call_timeout(timeout);
            if let Some(dir) = &self.working_dir {
                config = config.with_working_dir(dir);
            }
            McpClient::stdio(config)?
        } else {
            anyhow::bail!("either --server-bin or --url is required");
        };

        client.initialize().await?;
        Ok(client)
    }
}
