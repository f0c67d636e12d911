//! GitHub Actions plumbing
//!
//! Workflow commands (`::add-mask::`, `::error::`, ...) go to a writer,
//! outputs and environment variables go to the runner's file commands.

use anyhow::{bail, Context, Result};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File the runner reads step outputs from
pub const OUTPUT_FILE_ENV: &str = "GITHUB_OUTPUT";

/// File the runner reads exported environment variables from
pub const ENV_FILE_ENV: &str = "GITHUB_ENV";

/// Escape data for a workflow command
fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Escape a workflow command property
fn escape_property(value: &str) -> String {
    escape_data(value).replace(':', "%3A").replace(',', "%2C")
}

/// Render a `name<<delimiter` heredoc entry for a file command
fn file_command_entry(name: &str, value: &str) -> Result<String> {
    let delimiter = format!("ghadelimiter_{}", uuid::Uuid::new_v4());

    if name.contains(&delimiter) {
        bail!("Unexpected input: name should not contain the delimiter \"{}\"", delimiter);
    }
    if value.contains(&delimiter) {
        bail!("Unexpected input: value should not contain the delimiter \"{}\"", delimiter);
    }

    Ok(format!("{name}<<{delimiter}\n{value}\n{delimiter}\n"))
}

/// Lines of a secret value that should be registered as masks.
///
/// The runner masks line by line, so a multiline secret is masked one line
/// at a time. Empty lines and lines shorter than `min_len` characters are
/// skipped.
pub fn lines_to_mask(value: &str, min_len: usize) -> impl Iterator<Item = &str> {
    value
        .split("\r\n")
        .flat_map(|line| line.split(['\r', '\n']))
        .filter(move |line| !line.is_empty() && line.chars().count() >= min_len)
}

/// Access to the workflow the action runs in
pub struct Workflow<W: Write> {
    out: W,
    output_file: Option<PathBuf>,
    env_file: Option<PathBuf>,
}

impl Workflow<io::Stdout> {
    /// Workflow commands on stdout, file commands from the runner environment
    pub fn from_env() -> Self {
        let file = |var: &str| {
            std::env::var(var)
                .ok()
                .filter(|path| !path.is_empty())
                .map(PathBuf::from)
        };

        Self::new(io::stdout(), file(OUTPUT_FILE_ENV), file(ENV_FILE_ENV))
    }
}

impl<W: Write> Workflow<W> {
    pub fn new(out: W, output_file: Option<PathBuf>, env_file: Option<PathBuf>) -> Self {
        Self {
            out,
            output_file,
            env_file,
        }
    }

    /// Consume the workflow, returning the command writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn command(&mut self, command: &str, data: &str) -> Result<()> {
        writeln!(self.out, "::{}::{}", command, escape_data(data))
            .context("Failed to write workflow command")
    }

    /// Ask the runner to mask `value` in all further log output
    pub fn add_mask(&mut self, value: &str) -> Result<()> {
        self.command("add-mask", value)
    }

    pub fn warning(&mut self, message: &str) -> Result<()> {
        self.command("warning", message)
    }

    /// Report an error annotation; the caller decides the exit status
    pub fn error(&mut self, message: &str) -> Result<()> {
        self.command("error", message)
    }

    /// Set a step output
    pub fn set_output(&mut self, name: &str, value: &str) -> Result<()> {
        match &self.output_file {
            Some(path) => append_entry(path, name, value),
            None => {
                // Runners without file commands only understand the legacy command
                writeln!(
                    self.out,
                    "::set-output name={}::{}",
                    escape_property(name),
                    escape_data(value)
                )
                .context("Failed to write workflow command")
            }
        }
    }

    /// Export an environment variable to the following steps of the job
    pub fn export_variable(&mut self, name: &str, value: &str) -> Result<()> {
        let Some(path) = &self.env_file else {
            bail!("{} is not set, cannot export \"{}\" to the environment", ENV_FILE_ENV, name);
        };
        append_entry(path, name, value)
    }
}

fn append_entry(path: &Path, name: &str, value: &str) -> Result<()> {
    let entry = file_command_entry(name, value)?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open file command {:?}", path))?;

    file.write_all(entry.as_bytes())
        .with_context(|| format!("Failed to write file command {:?}", path))
}
