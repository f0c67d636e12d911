//! Action entry point
//!
//! Parses the configured references, fetches every secret and hands the
//! values to the workflow as outputs.

use crate::action::{lines_to_mask, Workflow};
use crate::config::ActionConfig;
use crate::gcp::auth::{AccessTokenSource, GcpCredentials, StaticToken};
use crate::gcp::client::SecretManagerClient;
use crate::gcp::payload::Encoding;
use crate::reference::{parse_secret_batch_with_location, ParseError, Reference};
use anyhow::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::io::Write;
use std::sync::Arc;

/// Secrets fetched at the same time
const MAX_CONCURRENT_REQUESTS: usize = 8;

/// Whether an error comes from the `secrets` input rather than from Secret Manager
pub fn is_reference_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| cause.is::<ParseError>())
}

/// Pick the token source: explicit key, pre-minted token, then ADC
async fn credentials_for<W: Write>(
    config: &ActionConfig,
    workflow: &mut Workflow<W>,
) -> Result<Arc<dyn AccessTokenSource>> {
    if let Some(credentials) = &config.credentials {
        workflow.warning(
            "The \"credentials\" input is deprecated. \
             Please switch to google-github-actions/auth, which supports both \
             Workload Identity Federation and service account key authentication.",
        )?;
        return Ok(Arc::new(GcpCredentials::from_service_account_json(credentials)?));
    }

    if let Some(token) = StaticToken::from_env() {
        tracing::info!("Using access token from environment");
        return Ok(Arc::new(token));
    }

    Ok(Arc::new(GcpCredentials::new().await?))
}

/// Run the action with credentials resolved from the configuration
pub async fn run<W: Write>(config: &ActionConfig, workflow: &mut Workflow<W>) -> Result<()> {
    // Reference errors should surface before any credential lookup
    let references =
        parse_secret_batch_with_location(&config.secrets, config.location.as_deref())?;

    let credentials = credentials_for(config, workflow).await?;
    let client = SecretManagerClient::new(credentials, &config.universe)?;

    emit_secrets(config, &client, &references, workflow).await
}

/// Run the action against an already built client
pub async fn run_with_client<W: Write>(
    config: &ActionConfig,
    client: &SecretManagerClient,
    workflow: &mut Workflow<W>,
) -> Result<()> {
    let references =
        parse_secret_batch_with_location(&config.secrets, config.location.as_deref())?;

    emit_secrets(config, client, &references, workflow).await
}

/// Fetch every referenced secret, keeping input order
pub async fn fetch_all(
    client: &SecretManagerClient,
    references: &[Reference],
    encoding: Encoding,
) -> Result<Vec<String>> {
    stream::iter(references)
        .map(|reference| client.access_secret(reference, encoding))
        .buffered(MAX_CONCURRENT_REQUESTS)
        .try_collect()
        .await
}

async fn emit_secrets<W: Write>(
    config: &ActionConfig,
    client: &SecretManagerClient,
    references: &[Reference],
    workflow: &mut Workflow<W>,
) -> Result<()> {
    if references.is_empty() {
        tracing::warn!("No secret references found in input");
        return Ok(());
    }

    tracing::info!("Fetching {} secret(s)", references.len());
    let values = fetch_all(client, references, config.encoding).await?;

    for (reference, value) in references.iter().zip(&values) {
        if config.enable_mask {
            for line in lines_to_mask(value, config.min_mask_length) {
                workflow.add_mask(line)?;
            }
        }

        workflow.set_output(reference.output(), value)?;

        if config.export_to_environment {
            workflow.export_variable(reference.output(), value)?;
        }

        tracing::debug!("Set output {}", reference.output());
    }

    Ok(())
}
