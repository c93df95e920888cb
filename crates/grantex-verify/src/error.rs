//! Error types for grant token verification
//!
//! Every verification failure maps to exactly one [`GrantexTokenError`]
//! variant. Callers branch on the variant (or on [`GrantexTokenError::code`])
//! instead of matching on message text.

use thiserror::Error;

use crate::claims::REQUIRED_CLAIMS;

/// Result alias used throughout the crate
pub type Result<T, E = GrantexTokenError> = std::result::Result<T, E>;

/// Key-set resolution failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyResolutionError {
    /// Network, status, or document-parse failure while fetching the key set
    #[error("failed to fetch JWKS from {uri}: {detail}")]
    FetchFailed {
        /// The key-set URI that was requested
        uri: String,
        /// Root cause
        detail: String,
    },

    /// The key-set document has no `keys` (or an empty array)
    #[error("JWKS contains no keys")]
    EmptyKeySet,

    /// Neither a `kid` match nor an RSA fallback key exists
    #[error("no matching RSA key found in JWKS (kid={kid:?})")]
    NoMatchingKey {
        /// The key identifier from the token header, if any
        kid: Option<String>,
    },

    /// The selected JWK record cannot be turned into an RSA public key
    #[error("failed to construct RSA key from JWK: {0}")]
    InvalidKeyMaterial(String),

    /// The HTTP client could not be built
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),
}

/// Grant token verification errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrantexTokenError {
    /// Wrong segment count, invalid base64, or invalid JSON
    #[error("malformed grant token: {0}")]
    MalformedToken(String),

    /// Header `alg` is anything other than RS256
    #[error("grant token uses unsupported algorithm '{0}'; only RS256 is allowed")]
    UnsupportedAlgorithm(String),

    /// The signing key could not be resolved
    #[error("key resolution failed: {0}")]
    KeyResolution(#[from] KeyResolutionError),

    /// RS256 verification against the resolved key failed
    #[error("grant token signature is invalid")]
    SignatureInvalid,

    /// `exp` plus clock tolerance lies in the past
    #[error("grant token has expired (exp={expired_at})")]
    Expired {
        /// The token's `exp` claim
        expired_at: i64,
    },

    /// `nbf` minus clock tolerance lies in the future
    #[error("grant token is not yet valid (nbf={not_before})")]
    NotYetValid {
        /// The token's `nbf` claim
        not_before: i64,
    },

    /// One or more required claims are absent
    #[error(
        "grant token is missing required claims ({}): {}",
        REQUIRED_CLAIMS.join(", "),
        .missing.join(", ")
    )]
    MissingClaims {
        /// The absent claim names, in required-claim order
        missing: Vec<String>,
    },

    /// An audience was configured and the token's `aud` does not contain it
    #[error("grant token audience mismatch: expected '{expected}', got {actual:?}")]
    AudienceMismatch {
        /// Audience configured by the caller
        expected: String,
        /// Audience values carried by the token
        actual: Vec<String>,
    },

    /// Not every required scope was granted
    #[error("grant token is missing required scopes: {}", .missing.join(", "))]
    InsufficientScope {
        /// Every missing scope, in the order the caller required them
        missing: Vec<String>,
    },
}

impl GrantexTokenError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Expired { .. } => "TOKEN_EXPIRED",
            Self::InsufficientScope { .. } => "SCOPE_INSUFFICIENT",
            Self::UnsupportedAlgorithm(_) => "UNSUPPORTED_ALGORITHM",
            Self::KeyResolution(_) => "KEY_RESOLUTION_FAILED",
            Self::MalformedToken(_)
            | Self::SignatureInvalid
            | Self::NotYetValid { .. }
            | Self::MissingClaims { .. }
            | Self::AudienceMismatch { .. } => "TOKEN_INVALID",
        }
    }

    /// HTTP status a middleware should answer with
    ///
    /// 403 for scope insufficiency, 401 for everything else.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InsufficientScope { .. } => 403,
            _ => 401,
        }
    }

    /// Whether the token failed only because it expired
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired { .. })
    }
}
