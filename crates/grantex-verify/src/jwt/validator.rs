//! RS256 signature and claim validation
//!
//! - The algorithm is pinned to RS256. [`SignatureVerifier::check_algorithm`]
//!   runs on the unverified header before any key is fetched, so `none`,
//!   `HS256` and friends never reach key resolution.
//! - The signature is checked over `header.payload` exactly as transmitted.
//! - `exp` and `nbf` are compared against the verifier's clock with the
//!   configured tolerance; `iat` must be present but is informational.
//! - `aud` is only compared when an audience is configured and the token
//!   carries one.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, Validation, decode, errors::ErrorKind};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::decoder::{TokenHeader, TokenSegments};
use super::jwks::RsaPublicKey;
use crate::claims::GrantTokenPayload;
use crate::error::{GrantexTokenError, Result};

/// The only accepted `alg` header value
pub const PINNED_ALGORITHM: &str = "RS256";

/// Source of the current time, in seconds since the Unix epoch
pub type Clock = fn() -> i64;

/// System clock
pub fn system_clock() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// RS256 signature and claim verifier
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    clock_tolerance: u64,
    audience: Option<String>,
    clock: Clock,
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self {
            clock_tolerance: 0,
            audience: None,
            clock: system_clock,
        }
    }
}

impl SignatureVerifier {
    /// Verifier with zero tolerance, no audience, and the system clock
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `seconds` of drift on `exp`/`nbf`
    pub fn with_clock_tolerance(mut self, seconds: u64) -> Self {
        self.clock_tolerance = seconds;
        self
    }

    /// Require `aud` to match when the token carries one
    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Reject every algorithm except RS256
    ///
    /// # Errors
    ///
    /// [`GrantexTokenError::UnsupportedAlgorithm`] carrying the header value.
    pub fn check_algorithm(header: &TokenHeader) -> Result<()> {
        if header.alg == PINNED_ALGORITHM {
            Ok(())
        } else {
            warn!(algorithm = %header.alg, "Rejected grant token algorithm");
            Err(GrantexTokenError::UnsupportedAlgorithm(header.alg.clone()))
        }
    }

    /// Verify the signature with `key`, then validate the claims
    ///
    /// # Errors
    ///
    /// Any [`GrantexTokenError`] other than `KeyResolution` and
    /// `InsufficientScope`.
    pub fn verify(&self, token: &str, key: &RsaPublicKey) -> Result<GrantTokenPayload> {
        let segments = TokenSegments::split(token)?;
        let header = super::decoder::decode_header(token)?;
        Self::check_algorithm(&header)?;

        if segments.signature.is_empty() {
            return Err(GrantexTokenError::SignatureInvalid);
        }

        let claims = self.verify_signature(token, key)?;
        self.validate_claims(claims)
    }

    fn verify_signature(&self, token: &str, key: &RsaPublicKey) -> Result<Map<String, Value>> {
        // Time, audience and presence checks run afterwards against our own clock
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        decode::<Map<String, Value>>(token, key.decoding_key(), &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                warn!(error = %e, kid = ?key.kid(), "Grant token signature verification failed");
                match e.kind() {
                    ErrorKind::Base64(_)
                    | ErrorKind::Json(_)
                    | ErrorKind::Utf8(_)
                    | ErrorKind::InvalidToken => GrantexTokenError::MalformedToken(e.to_string()),
                    _ => GrantexTokenError::SignatureInvalid,
                }
            })
    }

    /// Validate required claims, time window and audience of signed claims
    pub(crate) fn validate_claims(&self, claims: Map<String, Value>) -> Result<GrantTokenPayload> {
        let audience = claims.get("aud").map(audience_values).transpose()?;
        let payload = GrantTokenPayload::from_claims(claims)?;

        let now = (self.clock)();
        let leeway = i64::try_from(self.clock_tolerance).unwrap_or(i64::MAX);

        if now > payload.exp.saturating_add(leeway) {
            debug!(exp = payload.exp, now, leeway, "Grant token expired");
            return Err(GrantexTokenError::Expired {
                expired_at: payload.exp,
            });
        }

        if let Some(nbf) = payload.nbf
            && now.saturating_add(leeway) < nbf
        {
            debug!(nbf, now, leeway, "Grant token not yet valid");
            return Err(GrantexTokenError::NotYetValid { not_before: nbf });
        }

        if let (Some(expected), Some(actual)) = (&self.audience, audience)
            && !actual.iter().any(|aud| aud == expected)
        {
            return Err(GrantexTokenError::AudienceMismatch {
                expected: expected.clone(),
                actual,
            });
        }

        Ok(payload)
    }
}

/// `aud` may be a single string or an array of strings
fn audience_values(value: &Value) -> Result<Vec<String>> {
    match value {
        Value::String(aud) => Ok(vec![aud.clone()]),
        Value::Array(values) => values
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    GrantexTokenError::MalformedToken("aud must contain strings".to_string())
                })
            })
            .collect(),
        _ => Err(GrantexTokenError::MalformedToken(
            "aud must be a string or array of strings".to_string(),
        )),
    }
}
