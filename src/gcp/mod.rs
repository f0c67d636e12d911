//! GCP API interaction module
//!
//! This module provides the functionality for reading secrets from Google
//! Secret Manager: authentication, HTTP transport and payload decoding.
//!
//! # Module Structure
//!
//! - [`auth`] - Access tokens from Application Default Credentials or a key
//! - [`client`] - Secret Manager client resolving references to values
//! - [`http`] - HTTP utilities for REST API calls
//! - [`payload`] - Base64 payload decoding and output encodings
//!
//! # Example
//!
//! ```ignore
//! use crate::gcp::{auth::GcpCredentials, client::SecretManagerClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let credentials = GcpCredentials::new().await?;
//!     let client = SecretManagerClient::new(Arc::new(credentials), "googleapis.com")?;
//!     let reference = "token:my-project/api-token".parse()?;
//!     let value = client.access_secret(&reference, Encoding::Utf8).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod payload;
