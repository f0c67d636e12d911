//! Secret Manager Client
//!
//! Combines authentication and HTTP functionality to access secret versions.

use super::auth::AccessTokenSource;
use super::http::GcpHttpClient;
use super::payload::{decode_payload, Encoding};
use crate::reference::Reference;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

/// Universe domain of the public Google Cloud
pub const DEFAULT_UNIVERSE: &str = "googleapis.com";

/// Response body of `secrets.versions.access`
#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    #[serde(default)]
    payload: Option<SecretPayload>,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    #[serde(default)]
    data: Option<String>,
}

/// Where Secret Manager requests are sent
#[derive(Debug, Clone)]
enum Endpoint {
    /// `secretmanager.{universe}`, with `{location}.rep.` for regional secrets
    Universe(String),
    /// Fixed base URL for every request
    Fixed(Url),
}

/// Secret Manager client
#[derive(Clone)]
pub struct SecretManagerClient {
    credentials: Arc<dyn AccessTokenSource>,
    http: GcpHttpClient,
    endpoint: Endpoint,
}

impl SecretManagerClient {
    /// Create a client for the given universe domain
    pub fn new(credentials: Arc<dyn AccessTokenSource>, universe: &str) -> Result<Self> {
        let universe = universe.trim().trim_matches('.');
        if universe.is_empty() || !universe.split('.').all(is_dns_label) {
            bail!("Invalid universe domain \"{}\"", universe);
        }

        Ok(Self {
            credentials,
            http: GcpHttpClient::new()?,
            endpoint: Endpoint::Universe(universe.to_string()),
        })
    }

    /// Create a client that sends every request to `base_url`
    pub fn with_endpoint(credentials: Arc<dyn AccessTokenSource>, base_url: &str) -> Result<Self> {
        let url = Url::parse(base_url).with_context(|| format!("Invalid endpoint \"{}\"", base_url))?;

        Ok(Self {
            credentials,
            http: GcpHttpClient::new()?,
            endpoint: Endpoint::Fixed(url),
        })
    }

    /// Replace the HTTP client, e.g. to change the retry policy
    pub fn with_http(mut self, http: GcpHttpClient) -> Self {
        self.http = http;
        self
    }

    /// Build the Secret Manager API base URL, regional when `location` is set
    pub fn secretmanager_url(&self, location: Option<&str>) -> Result<String> {
        match &self.endpoint {
            Endpoint::Fixed(url) => Ok(url.as_str().trim_end_matches('/').to_string()),
            Endpoint::Universe(universe) => match location {
                Some(location) => {
                    // The location becomes part of the host name
                    if !is_dns_label(location) {
                        bail!("Invalid secret location \"{}\"", location);
                    }
                    Ok(format!("https://secretmanager.{}.rep.{}/v1", location, universe))
                }
                None => Ok(format!("https://secretmanager.{}/v1", universe)),
            },
        }
    }

    /// Build the `:access` URL for a reference
    pub fn access_url(&self, reference: &Reference) -> Result<String> {
        let base = self.secretmanager_url(reference.location())?;
        Ok(format!("{}/{}:access", base, reference.self_link()))
    }

    /// Fetch and decode the payload of the referenced secret version
    pub async fn access_secret(&self, reference: &Reference, encoding: Encoding) -> Result<String> {
        let self_link = reference.self_link();
        self.fetch_payload(reference, encoding)
            .await
            .with_context(|| format!("Failed to access secret \"{}\"", self_link))
    }

    async fn fetch_payload(&self, reference: &Reference, encoding: Encoding) -> Result<String> {
        let url = self.access_url(reference)?;
        let token = self.credentials.access_token().await?;
        let response = self.http.get(&url, &token).await?;

        let parsed: AccessSecretVersionResponse =
            serde_json::from_value(response).context("Unexpected access response")?;

        let data = parsed
            .payload
            .and_then(|p| p.data)
            .filter(|d| !d.is_empty())
            .context("Secret returned no data")?;

        tracing::info!("Accessed secret {}", reference.self_link());
        decode_payload(&data, encoding)
    }
}

/// Lowercase letters, digits and inner hyphens
fn is_dns_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::auth::StaticToken;
    use crate::reference::parse_reference;

    fn client(universe: &str) -> SecretManagerClient {
        SecretManagerClient::new(Arc::new(StaticToken::new("t")), universe).unwrap()
    }

    #[test]
    fn test_global_url() {
        let reference = parse_reference("out:fruits/apple/1").unwrap();
        assert_eq!(
            client(DEFAULT_UNIVERSE).access_url(&reference).unwrap(),
            "https://secretmanager.googleapis.com/v1/projects/fruits/secrets/apple/versions/1:access"
        );
    }

    #[test]
    fn test_regional_url() {
        let reference = parse_reference("out:fruits/us-east1/apple/1").unwrap();
        assert_eq!(
            client(DEFAULT_UNIVERSE).access_url(&reference).unwrap(),
            "https://secretmanager.us-east1.rep.googleapis.com/v1/projects/fruits/locations/us-east1/secrets/apple/versions/1:access"
        );
    }

    #[test]
    fn test_custom_universe() {
        assert_eq!(
            client("example.cloud").secretmanager_url(None).unwrap(),
            "https://secretmanager.example.cloud/v1"
        );
    }

    #[test]
    fn test_invalid_universe_rejected() {
        let result = SecretManagerClient::new(Arc::new(StaticToken::new("t")), "evil.com/x?");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_location_rejected() {
        let reference = parse_reference("out:fruits/evil.com#/apple/1").unwrap();
        assert!(client(DEFAULT_UNIVERSE).access_url(&reference).is_err());
    }

    #[test]
    fn test_fixed_endpoint_ignores_location() {
        let client = SecretManagerClient::with_endpoint(
            Arc::new(StaticToken::new("t")),
            "http://127.0.0.1:8080/v1/",
        )
        .unwrap();
        assert_eq!(
            client.secretmanager_url(Some("us-east1")).unwrap(),
            "http://127.0.0.1:8080/v1"
        );
    }

    #[test]
    fn test_dns_label() {
        assert!(is_dns_label("us-central1"));
        assert!(!is_dns_label("-us"));
        assert!(!is_dns_label("US"));
        assert!(!is_dns_label("a.b"));
        assert!(!is_dns_label(""));
    }
}
