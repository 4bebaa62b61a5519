//! `bran run` - invoke the server's runner tool and print the report.

use anyhow::{bail, Context as _, Result};
use clap::Args;
use serde_json::{json, Value};

use bran_runner::{RunnerConfig, RunnerOutcome};

use super::{Context, ServerArgs};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Name of the runner tool to invoke
    #[arg(long, default_value = "run-tests")]
    pub tool: String,

    /// Path to a runner configuration file
    #[arg(long)]
    pub config: Option<String>,

    /// Profile to run
    #[arg(long)]
    pub profile: Option<String>,

    /// Suite to run
    #[arg(long)]
    pub suite: Option<String>,

    /// Feature paths to execute (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub paths: Vec<String>,

    /// Additional runner option as KEY=VALUE (repeatable)
    #[arg(long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,
}

impl RunArgs {
    fn runner_config(&self) -> Result<RunnerConfig> {
        let mut config = RunnerConfig::new();
        if let Some(path) = &self.config {
            config = config.with_config(path);
        }
        if let Some(profile) = &self.profile {
            config = config.with_profile(profile);
        }
        if let Some(suite) = &self.suite {
            config = config.with_suite(suite);
        }
        if !self.paths.is_empty() {
            config = config.with_paths(self.paths.clone());
        }
        for option in &self.options {
            let (key, value) = option
                .split_once('=')
                .with_context(|| format!("invalid --option '{}', expected KEY=VALUE", option))?;
            config = config.with_option(key, parse_option_value(value));
        }
        Ok(config)
    }
}

/// Literal `true`/`false` become booleans; everything else stays a string.
fn parse_option_value(value: &str) -> Value {
    match value {
        "true" => json!(true),
        "false" => json!(false),
        other => json!(other),
    }
}

pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    let runner_config = args.runner_config()?;
    let arguments = runner_config.to_arguments()?;

    let client = args.server.connect().await?;
    let result = client.call_tool(&args.tool, Some(arguments)).await;
    client.shutdown().await.ok();
    let result = result?;

    if result.is_error() {
        bail!(
            "tool '{}' failed: {}",
            args.tool,
            result.text().unwrap_or_default()
        );
    }

    let text = result
        .text()
        .context("tool returned no text content to decode")?;

    match RunnerOutcome::from_text(&text)
        .with_context(|| format!("tool '{}' returned undecodable report text", args.tool))?
    {
        RunnerOutcome::Report(report) => {
            if ctx.json_output {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "tests: {}  failed: {}  skipped: {}",
                    report.tests, report.failed, report.skipped
                );
            }
            if !report.passed() {
                bail!("{} test(s) failed", report.failed);
            }
            Ok(())
        }
        RunnerOutcome::Error { error } => bail!("runner error: {}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> RunArgs {
        RunArgs {
            server: ServerArgs {
                server_bin: Some("behat-mcp-server".to_string()),
                url: None,
                server_args: Vec::new(),
                working_dir: None,
                timeout_secs: 5,
            },
            tool: "run-tests".to_string(),
            config: None,
            profile: None,
            suite: None,
            paths: Vec::new(),
            options: Vec::new(),
        }
    }

    #[test]
    fn option_values_parse_booleans() {
        assert_eq!(parse_option_value("true"), json!(true));
        assert_eq!(parse_option_value("false"), json!(false));
        assert_eq!(parse_option_value("pretty"), json!("pretty"));
    }

    #[test]
    fn runner_config_collects_flags() {
        let mut args = base_args();
        args.profile = Some("calculator".to_string());
        args.paths = vec!["features/a.feature".to_string()];
        args.options = vec!["--stop-on-failure=true".to_string()];

        let config = args.runner_config().unwrap();
        assert_eq!(config.profile.as_deref(), Some("calculator"));
        assert_eq!(config.paths.as_deref(), Some(&["features/a.feature".to_string()][..]));
        let options = config.additional_options.unwrap();
        assert_eq!(options["--stop-on-failure"], json!(true));
    }

    #[test]
    fn malformed_option_is_rejected() {
        let mut args = base_args();
        args.options = vec!["no-equals-sign".to_string()];
        assert!(args.runner_config().is_err());
    }
}
