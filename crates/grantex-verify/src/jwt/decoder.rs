//! Compact JWS decoding without verification
//!
//! Used to peek at the header (algorithm and key id) before any trust is
//! established, and to read claims on the trusted decode path. Nothing here
//! checks a signature.

use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{GrantexTokenError, Result};

/// JOSE header fields needed before verification
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm as written by the issuer (untrusted)
    pub alg: String,
    /// Key identifier
    #[serde(default)]
    pub kid: Option<String>,
    /// Token type
    #[serde(default)]
    pub typ: Option<String>,
}

/// The three segments of a compact JWS, still encoded
#[derive(Debug, Clone, Copy)]
pub(crate) struct TokenSegments<'a> {
    pub header: &'a str,
    pub payload: &'a str,
    pub signature: &'a str,
}

impl<'a> TokenSegments<'a> {
    /// Split on `.`; exactly three segments are accepted
    pub(crate) fn split(token: &'a str) -> Result<Self> {
        let mut parts = token.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(header), Some(payload), Some(signature), None) => Ok(Self {
                header,
                payload,
                signature,
            }),
            _ => Err(GrantexTokenError::MalformedToken(
                "expected three '.'-separated segments".to_string(),
            )),
        }
    }
}

/// Decode the token header without verifying anything
///
/// # Errors
///
/// [`GrantexTokenError::MalformedToken`] for a wrong segment count, invalid
/// base64url, invalid JSON, or a header without a string `alg`.
pub fn decode_header(token: &str) -> Result<TokenHeader> {
    let segments = TokenSegments::split(token)?;
    let header = decode_segment(segments.header, "header")?;
    serde_json::from_value(Value::Object(header))
        .map_err(|e| GrantexTokenError::MalformedToken(format!("invalid header: {e}")))
}

/// Decode the token claims without verifying the signature
///
/// # Errors
///
/// [`GrantexTokenError::MalformedToken`] for a wrong segment count, invalid
/// base64url, or a payload that is not a JSON object.
pub fn decode_claims_unverified(token: &str) -> Result<Map<String, Value>> {
    let segments = TokenSegments::split(token)?;
    // The header must be well formed even when only the claims are wanted.
    decode_segment(segments.header, "header")?;
    decode_segment(segments.payload, "payload")
}

/// Base64url-decode a segment into a JSON object, tolerating missing padding
fn decode_segment(segment: &str, name: &str) -> Result<Map<String, Value>> {
    let mut padded = String::with_capacity(segment.len() + 3);
    padded.push_str(segment);
    while padded.len() % 4 != 0 {
        padded.push('=');
    }

    let bytes = URL_SAFE.decode(padded.as_bytes()).map_err(|e| {
        GrantexTokenError::MalformedToken(format!("invalid base64 in {name}: {e}"))
    })?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(GrantexTokenError::MalformedToken(format!(
            "{name} is not a JSON object"
        ))),
        Err(e) => Err(GrantexTokenError::MalformedToken(format!(
            "invalid JSON in {name}: {e}"
        ))),
    }
}
