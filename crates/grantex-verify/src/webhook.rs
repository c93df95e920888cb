//! Webhook signature verification
//!
//! Webhook deliveries carry an `X-Grantex-Signature` header of the form
//! `sha256=<hex>`, the HMAC-SHA256 of the raw request body keyed with the
//! endpoint secret. Verify against the body bytes exactly as received, not a
//! re-serialization of the parsed JSON.
//!
//! ```rust
//! use grantex_verify::webhook::{sign_webhook_payload, verify_webhook_signature};
//!
//! let body = br#"{"id":"evt_01","type":"grant.created","data":{}}"#;
//! let header = sign_webhook_payload(body, "my-webhook-secret");
//!
//! assert!(verify_webhook_signature(body, &header, "my-webhook-secret"));
//! assert!(!verify_webhook_signature(body, &header, "other-secret"));
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of the signature header value
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the `sha256=<hex>` signature header for `payload`
///
/// # Panics
///
/// Never: HMAC-SHA256 accepts keys of any length.
pub fn sign_webhook_payload(payload: impl AsRef<[u8]>, secret: &str) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(payload.as_ref());
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Check a webhook signature header in constant time
///
/// Returns `true` iff `signature` equals [`sign_webhook_payload`] of
/// `payload` under `secret`. A mismatch is never an error.
pub fn verify_webhook_signature(
    payload: impl AsRef<[u8]>,
    signature: &str,
    secret: &str,
) -> bool {
    let expected = sign_webhook_payload(payload, secret);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}
