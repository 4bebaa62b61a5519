//! Collaborator interface for the BDD test-runner tool.
//!
//! The runner itself lives behind the MCP boundary: a tool that accepts a
//! configuration object, maps it onto command-line flags, executes the
//! suite, and returns the decoded JSON report. This crate defines only the
//! two sides of that contract: the configuration the harness sends as
//! `tools/call` arguments and the report/error envelope it reads back from
//! the tool's text content.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Option keys owned by the runner tool and silently discarded if a caller
/// supplies them: the runner controls its own output format and
/// destination so it can read the report back.
pub const RESERVED_OPTIONS: [&str; 4] = ["--format", "--out", "-f", "-o"];

/// Configuration object for one runner invocation.
///
/// Serializes to the tool's `arguments` object with camelCase keys; unset
/// fields are omitted entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfig {
    /// Path to a runner configuration file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    /// Profile to run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Suite to run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite: Option<String>,
    /// Feature paths to execute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<String>>,
    /// Additional command-line options as key-value pairs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_options: Option<Map<String, Value>>,
}

impl RunnerConfig {
    /// Create an empty configuration (runs the default suite).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration file path.
    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = Some(config.into());
        self
    }

    /// Set the profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Set the suite.
    pub fn with_suite(mut self, suite: impl Into<String>) -> Self {
        self.suite = Some(suite.into());
        self
    }

    /// Set the feature paths.
    pub fn with_paths(mut self, paths: Vec<String>) -> Self {
        self.paths = Some(paths);
        self
    }

    /// Add one additional command-line option.
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.additional_options
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    /// Strip reserved option keys from `additional_options`.
    ///
    /// The runner ignores them anyway; dropping them here keeps the sent
    /// arguments honest about what will take effect.
    pub fn sanitized(mut self) -> Self {
        if let Some(options) = &mut self.additional_options {
            options.retain(|key, _| !RESERVED_OPTIONS.contains(&key.as_str()));
            if options.is_empty() {
                self.additional_options = None;
            }
        }
        self
    }

    /// The `arguments` object for a `tools/call` request.
    pub fn to_arguments(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self.clone().sanitized())
    }
}

/// Structured report produced by a runner invocation.
///
/// Counters the harness asserts on are typed; everything else the report
/// carries is retained in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    /// Number of tests executed.
    #[serde(default)]
    pub tests: u64,
    /// Number of failed tests.
    #[serde(default)]
    pub failed: u64,
    /// Number of skipped tests.
    #[serde(default)]
    pub skipped: u64,
    /// Remaining report fields, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TestReport {
    /// Whether the run passed (no failures).
    pub fn passed(&self) -> bool {
        self.failed == 0
    }
}

/// What the runner tool returned: a report, or its error envelope.
///
/// Error is tried first: a report shape with defaulted counters would
/// otherwise swallow `{"error": ...}` objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RunnerOutcome {
    /// The runner failed before producing a report.
    Error {
        /// Human-readable failure description.
        error: String,
    },
    /// A decoded test report.
    Report(TestReport),
}

impl RunnerOutcome {
    /// Decode the outcome from the text content of a tool result.
    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_config_serializes_to_empty_object() {
        let args = RunnerConfig::new().to_arguments().unwrap();
        assert_eq!(args, json!({}));
    }

    #[test]
    fn arguments_use_camel_case_keys() {
        let config = RunnerConfig::new()
            .with_config("behat.yml")
            .with_profile("calculator")
            .with_suite("default")
            .with_paths(vec!["features/calculator.feature".to_string()])
            .with_option("--stop-on-failure", json!(true));

        let args = config.to_arguments().unwrap();
        assert_eq!(args["config"], json!("behat.yml"));
        assert_eq!(args["profile"], json!("calculator"));
        assert_eq!(args["suite"], json!("default"));
        assert_eq!(args["paths"], json!(["features/calculator.feature"]));
        assert_eq!(args["additionalOptions"]["--stop-on-failure"], json!(true));
    }

    #[test]
    fn reserved_options_are_stripped() {
        let config = RunnerConfig::new()
            .with_option("--format", json!("progress"))
            .with_option("--out", json!("/tmp/out"))
            .with_option("-f", json!("pretty"))
            .with_option("-o", json!("std"))
            .with_option("--stop-on-failure", json!(true));

        let sanitized = config.sanitized();
        let options = sanitized.additional_options.unwrap();
        assert_eq!(options.len(), 1);
        assert!(options.contains_key("--stop-on-failure"));
    }

    #[test]
    fn all_reserved_options_collapse_to_none() {
        let config = RunnerConfig::new().with_option("--format", json!("json"));
        let sanitized = config.sanitized();
        assert!(sanitized.additional_options.is_none());
        assert_eq!(sanitized.to_arguments().unwrap(), json!({}));
    }

    #[test]
    fn report_decodes_with_extras_retained() {
        let outcome =
            RunnerOutcome::from_text(r#"{"tests":3,"failed":1,"skipped":0,"pending":2}"#).unwrap();
        match outcome {
            RunnerOutcome::Report(report) => {
                assert_eq!(report.tests, 3);
                assert_eq!(report.failed, 1);
                assert_eq!(report.skipped, 0);
                assert!(!report.passed());
                assert_eq!(report.extra["pending"], json!(2));
            }
            RunnerOutcome::Error { .. } => panic!("expected report"),
        }
    }

    #[test]
    fn error_envelope_decodes_as_error() {
        let outcome = RunnerOutcome::from_text(r#"{"error":"Failed to decode JSON output"}"#).unwrap();
        match outcome {
            RunnerOutcome::Error { error } => {
                assert_eq!(error, "Failed to decode JSON output");
            }
            RunnerOutcome::Report(_) => panic!("expected error"),
        }
    }

    #[test]
    fn missing_counters_default_to_zero() {
        let outcome = RunnerOutcome::from_text(r#"{"tests":2}"#).unwrap();
        match outcome {
            RunnerOutcome::Report(report) => {
                assert_eq!(report.tests, 2);
                assert_eq!(report.failed, 0);
                assert!(report.passed());
            }
            RunnerOutcome::Error { .. } => panic!("expected report"),
        }
    }
}
