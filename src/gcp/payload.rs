//! Secret payload decoding
//!
//! Secret Manager returns the payload as base64. The decoded bytes are then
//! rendered as text in the encoding the workflow asked for.

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use clap::ValueEnum;
use std::fmt;

/// How decoded secret bytes are turned into an output string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Encoding {
    #[default]
    #[value(name = "utf8", alias = "utf-8")]
    Utf8,
    #[value(name = "latin1", alias = "binary")]
    Latin1,
    Hex,
    Base64,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Utf8 => "utf8",
            Encoding::Latin1 => "latin1",
            Encoding::Hex => "hex",
            Encoding::Base64 => "base64",
        };
        f.write_str(name)
    }
}

impl Encoding {
    /// Render raw bytes as a string
    pub fn render(self, bytes: Vec<u8>) -> Result<String> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes)
                .context("Secret payload is not valid UTF-8, use the hex or base64 encoding"),
            Encoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
            Encoding::Hex => Ok(hex::encode(bytes)),
            Encoding::Base64 => Ok(STANDARD.encode(bytes)),
        }
    }
}

/// Decode base64 or base64url data, padded or not
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let normalized: String = data
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    STANDARD_NO_PAD
        .decode(normalized)
        .context("Secret payload is not valid base64")
}

/// Decode the `payload.data` field of an access response
pub fn decode_payload(data: &str, encoding: Encoding) -> Result<String> {
    if data.trim().is_empty() {
        bail!("Secret payload is empty");
    }

    let bytes = decode_base64(data)?;
    encoding.render(bytes)
}
