//! Verification configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-call options for [`crate::verify_grant_token`]
///
/// # Example
///
/// ```rust
/// use grantex_verify::VerifyOptions;
///
/// let options = VerifyOptions::new("https://auth.grantex.dev/.well-known/jwks.json")
///     .with_required_scopes(["calendar:read"])
///     .with_clock_tolerance(5);
///
/// assert_eq!(options.required_scopes, vec!["calendar:read".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOptions {
    /// Where to fetch the key set
    #[serde(alias = "key_set_uri")]
    pub jwks_uri: String,
    /// Scopes the token must carry; empty means no requirement
    #[serde(default)]
    pub required_scopes: Vec<String>,
    /// Leeway in seconds for `exp`/`nbf` comparisons
    #[serde(default)]
    pub clock_tolerance: u64,
    /// Expected `aud`; not enforced when `None`
    #[serde(default)]
    pub audience: Option<String>,
}

impl VerifyOptions {
    /// Options with no scope requirement, no tolerance and no audience
    pub fn new(jwks_uri: impl Into<String>) -> Self {
        Self {
            jwks_uri: jwks_uri.into(),
            required_scopes: Vec::new(),
            clock_tolerance: 0,
            audience: None,
        }
    }

    /// Require these scopes
    pub fn with_required_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Set clock tolerance in seconds
    pub fn with_clock_tolerance(mut self, seconds: u64) -> Self {
        self.clock_tolerance = seconds;
        self
    }

    /// Set the expected audience
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }
}

/// Configuration for [`crate::jwt::JwksResolver`]
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Request timeout (default: 10 seconds)
    pub request_timeout: Duration,

    /// User agent for key-set requests
    pub user_agent: String,

    /// Reject plain `http` URIs unless the host is loopback (default: true)
    pub require_https: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            user_agent: format!("grantex-verify/{}", env!("CARGO_PKG_VERSION")),
            require_https: true,
        }
    }
}

/// Configuration for [`crate::jwt::CachingKeyResolver`]
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a fetched key set is served (default: 10 minutes)
    pub ttl: Duration,

    /// Minimum spacing between re-fetches triggered by an unknown `kid`
    /// (default: 5 seconds)
    pub min_refresh_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            min_refresh_interval: Duration::from_secs(5),
        }
    }
}
