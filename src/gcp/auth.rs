//! GCP Authentication
//!
//! Handles authentication using Application Default Credentials (ADC)
//! or an explicit service account key.

use anyhow::{Context, Result};
use base64::Engine;
use futures::future::{BoxFuture, FutureExt};
use gcp_auth::{CustomServiceAccount, TokenProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default scopes for GCP API access
pub const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

/// Environment variable holding a pre-minted access token (same name gcloud uses)
pub const ACCESS_TOKEN_ENV: &str = "CLOUDSDK_AUTH_ACCESS_TOKEN";

/// Token expiry buffer - refresh tokens this much before they actually expire
/// This prevents using tokens that are about to expire during a request
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if we can't determine expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Something that can hand out a bearer token for Secret Manager calls
pub trait AccessTokenSource: Send + Sync {
    fn access_token(&self) -> BoxFuture<'_, Result<String>>;
}

/// A fixed access token, used as-is for every request
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Read the token from `CLOUDSDK_AUTH_ACCESS_TOKEN`, if set and non-empty
    pub fn from_env() -> Option<Self> {
        std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(Self)
    }
}

impl AccessTokenSource for StaticToken {
    fn access_token(&self) -> BoxFuture<'_, Result<String>> {
        let token: Result<String> = Ok(self.0.clone());
        futures::future::ready(token).boxed()
    }
}

/// GCP credentials holder with token caching
#[derive(Clone)]
pub struct GcpCredentials {
    provider: Arc<dyn TokenProvider>,
    token_cache: Arc<TokenCache>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    /// Check if this cached token is still valid
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Single cached token shared by concurrent requests
#[derive(Default)]
struct TokenCache {
    slot: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    /// Return the cached token, or run `fetch` once and cache its result.
    ///
    /// Callers racing on an empty cache wait on the write lock and reuse
    /// the token the first one stored.
    async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        {
            let cache = self.slot.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
                return Ok(cached.token.clone());
            }
        }

        let mut cache = self.slot.write().await;
        match cache.as_ref() {
            Some(cached) if cached.is_valid() => return Ok(cached.token.clone()),
            Some(_) => tracing::debug!("Cached token expired, fetching new token"),
            None => {}
        }

        let token = fetch().await?;

        // gcp_auth exposes the expiry as a chrono timestamp; a fixed conservative TTL is enough here
        *cache = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER,
        });

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            (DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(token)
    }
}

impl GcpCredentials {
    /// Create new GCP credentials using Application Default Credentials
    pub async fn new() -> Result<Self> {
        let provider = gcp_auth::provider().await.context(
            "Failed to initialize GCP authentication. Run google-github-actions/auth before this step",
        )?;

        Ok(Self::with_provider(provider))
    }

    /// Create credentials from a service account key.
    ///
    /// Accepts the key JSON as-is or base64 encoded.
    pub fn from_service_account_json(credentials: &str) -> Result<Self> {
        let json = decode_credentials(credentials)?;
        let account = CustomServiceAccount::from_json(&json)
            .context("Failed to parse service account credentials")?;

        Ok(Self::with_provider(Arc::new(account)))
    }

    fn with_provider(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            token_cache: Arc::new(TokenCache::default()),
        }
    }

    /// Get an access token for API calls
    /// Security: Checks token expiry before returning cached token
    pub async fn get_token(&self) -> Result<String> {
        self.token_cache
            .get_or_fetch(move || async move {
                let token = self
                    .provider
                    .token(DEFAULT_SCOPES)
                    .await
                    .context("Failed to get access token")?;
                Ok::<_, anyhow::Error>(token.as_str().to_string())
            })
            .await
    }
}

impl AccessTokenSource for GcpCredentials {
    fn access_token(&self) -> BoxFuture<'_, Result<String>> {
        self.get_token().boxed()
    }
}

/// Service account keys may be pasted raw or base64 encoded
fn decode_credentials(credentials: &str) -> Result<String> {
    let trimmed = credentials.trim();
    if trimmed.starts_with('{') {
        return Ok(trimmed.to_string());
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .context("Credentials are neither JSON nor base64-encoded JSON")?;

    String::from_utf8(bytes).context("Decoded credentials are not valid UTF-8")
}
