//! Configuration Management
//!
//! Action inputs arrive as `INPUT_*` environment variables set by the
//! runner. Every input can also be passed as a command line flag for local
//! runs.

use crate::gcp::client::DEFAULT_UNIVERSE;
use crate::gcp::payload::Encoding;
use anyhow::{bail, Result};
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Lines shorter than this are not registered as masks by default
pub const DEFAULT_MIN_MASK_LENGTH: usize = 4;

/// Parse a boolean input the way the runner's toolkit does
pub fn parse_boolean_input(value: &str) -> Result<bool, String> {
    match value.trim() {
        "true" | "True" | "TRUE" => Ok(true),
        "false" | "False" | "FALSE" => Ok(false),
        other => Err(format!(
            "\"{other}\" is not a boolean, expected one of true|True|TRUE|false|False|FALSE"
        )),
    }
}

/// First line of a rejected command line, for the workflow error annotation
pub fn input_error_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    format!("invalid action input: {}", first.trim_start_matches("error: "))
}

/// Fetch Google Secret Manager secrets as GitHub Actions outputs
#[derive(Parser, Debug)]
#[command(name = "secretmanager-action", version, about, long_about = None)]
pub struct Cli {
    /// Secrets to fetch, one `output:reference` per line or comma separated
    #[arg(long, env = "INPUT_SECRETS")]
    pub secrets: String,

    /// Mask secret values in the workflow logs
    #[arg(long, env = "INPUT_ENABLE-MASK", default_value = "true", action = ArgAction::Set, value_parser = parse_boolean_input)]
    pub enable_mask: bool,

    /// Minimum length of a secret line to be masked
    #[arg(long, env = "INPUT_MIN-MASK-LENGTH", default_value_t = DEFAULT_MIN_MASK_LENGTH)]
    pub min_mask_length: usize,

    /// Also export every secret as an environment variable for later steps
    #[arg(long, env = "INPUT_EXPORT-TO-ENVIRONMENT", default_value = "false", action = ArgAction::Set, value_parser = parse_boolean_input)]
    pub export_to_environment: bool,

    /// Encoding used to render the secret bytes
    #[arg(long, env = "INPUT_ENCODING", value_enum, ignore_case = true, default_value_t = Encoding::Utf8)]
    pub encoding: Encoding,

    /// Universe domain of the Secret Manager API
    #[arg(long, env = "INPUT_UNIVERSE", default_value = DEFAULT_UNIVERSE)]
    pub universe: String,

    /// Default location for references that do not carry one
    #[arg(long, env = "INPUT_LOCATION")]
    pub location: Option<String>,

    /// Service account key JSON (deprecated, prefer google-github-actions/auth)
    #[arg(long, env = "INPUT_CREDENTIALS", hide_env_values = true)]
    pub credentials: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// Log filter at `level`, replaced by `RUST_LOG`-style directives when given
pub fn log_filter(level: Level, directives: Option<&str>) -> EnvFilter {
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::from_level(level).into());
    builder.parse_lossy(directives.map(str::trim).unwrap_or_default())
}

/// Validated action configuration
#[derive(Debug, Clone)]
pub struct ActionConfig {
    pub secrets: String,
    pub enable_mask: bool,
    pub min_mask_length: usize,
    pub export_to_environment: bool,
    pub encoding: Encoding,
    pub universe: String,
    pub location: Option<String>,
    pub credentials: Option<String>,
}

impl Cli {
    /// Effective log level (flag > `RUNNER_DEBUG` > warn)
    pub fn effective_log_level(&self) -> LogLevel {
        self.log_level.unwrap_or_else(|| {
            if std::env::var("RUNNER_DEBUG").as_deref() == Ok("1") {
                LogLevel::Debug
            } else {
                LogLevel::Warn
            }
        })
    }

    /// Validate the inputs and build the action configuration
    pub fn into_config(self) -> Result<ActionConfig> {
        if self.secrets.trim().is_empty() {
            bail!("Input required and not supplied: secrets");
        }

        let non_blank = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(ActionConfig {
            secrets: self.secrets,
            enable_mask: self.enable_mask,
            min_mask_length: self.min_mask_length,
            export_to_environment: self.export_to_environment,
            encoding: self.encoding,
            universe: self.universe.trim().to_string(),
            location: non_blank(self.location),
            credentials: non_blank(self.credentials),
        })
    }
}
