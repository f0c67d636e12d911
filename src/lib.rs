//! Fetch Google Secret Manager secrets from a GitHub Actions workflow.
//!
//! The `secrets` input lists `output:reference` pairs. Each reference is
//! resolved into a Secret Manager resource path by [`reference`], fetched by
//! [`gcp::client::SecretManagerClient`] and written back to the workflow by
//! [`action::Workflow`].

pub mod action;
pub mod config;
pub mod gcp;
pub mod reference;
pub mod runner;

pub use reference::{parse_reference, parse_secret_batch, ParseError, Reference};
