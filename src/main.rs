use anyhow::{Context, Result};
use clap::Parser;
use secretmanager_action::action::Workflow;
use secretmanager_action::config::{input_error_message, log_filter, Cli, LogLevel};
use secretmanager_action::runner;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(tracing_level, rust_log.as_deref());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    // Stdout carries workflow commands, so logs go to stderr or a file
    let guard = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {:?}", parent))?;
            }

            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            builder.with_writer(non_blocking).init();
            Some(guard)
        }
        None => {
            builder.with_writer(std::io::stderr).init();
            None
        }
    };

    tracing::info!("secretmanager-action started with log level: {:?}", level);

    Ok(guard)
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut workflow = Workflow::from_env();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version
        Err(err) if !err.use_stderr() => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            let _ = err.print();
            let message = input_error_message(&err);
            if workflow.error(&message).is_err() {
                eprintln!("{message}");
            }
            return ExitCode::FAILURE;
        }
    };

    let log_guard = setup_logging(cli.effective_log_level(), cli.log_file.as_deref());
    let _log_guard = match log_guard {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Failed to set up logging: {err:#}");
            None
        }
    };

    let result = match cli.into_config() {
        Ok(config) => runner::run(&config, &mut workflow).await,
        Err(err) => Err(err),
    };

    let Err(err) = result else {
        return ExitCode::SUCCESS;
    };

    let message = if runner::is_reference_error(&err) {
        format!("invalid secret reference configuration: {err:#}")
    } else {
        format!("secretmanager-action failed with: {err:#}")
    };

    tracing::error!("{}", message);
    if workflow.error(&message).is_err() {
        eprintln!("{message}");
    }

    ExitCode::FAILURE
}
