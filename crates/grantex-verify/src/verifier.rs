//! Grant verification service
//!
//! [`GrantVerifier::verify_grant_token`] runs, in order:
//!
//! 1. header decode (no trust yet)
//! 2. algorithm pin (RS256), before any network access
//! 3. key resolution (one key-set fetch through the resolver)
//! 4. signature, required-claim, time-window and audience checks
//! 5. scope enforcement when `required_scopes` is non-empty
//! 6. mapping to [`VerifiedGrant`]
//!
//! [`GrantVerifier::decode_trusted`] skips steps 2–5 and must only be used on
//! tokens the authorization service has just attested.

use tracing::{debug, warn};

use crate::claims::{GrantTokenPayload, VerifiedGrant};
use crate::config::VerifyOptions;
use crate::error::{GrantexTokenError, Result};
use crate::jwt::decoder;
use crate::jwt::jwks::{JwksResolver, KeyResolver};
use crate::jwt::validator::{Clock, SignatureVerifier, system_clock};
use crate::scope;

/// Verifies grant tokens against a published key set
///
/// Holds no per-call state; one instance can serve concurrent calls.
///
/// # Example
///
/// ```rust,no_run
/// # use grantex_verify::{GrantVerifier, VerifyOptions};
/// # tokio_test::block_on(async {
/// let verifier = GrantVerifier::new()?;
/// let options = VerifyOptions::new("https://auth.grantex.dev/.well-known/jwks.json")
///     .with_required_scopes(["calendar:read"]);
///
/// let grant = verifier.verify_grant_token("eyJhbGciOi...", &options).await?;
/// println!("{} acts for {}", grant.agent_did, grant.principal_id);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct GrantVerifier<R = JwksResolver> {
    resolver: R,
    clock: Clock,
}

impl GrantVerifier<JwksResolver> {
    /// Verifier backed by an uncached HTTP resolver
    ///
    /// # Errors
    ///
    /// [`GrantexTokenError::KeyResolution`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Ok(Self::with_resolver(JwksResolver::new()?))
    }
}

impl<R: KeyResolver> GrantVerifier<R> {
    /// Verifier backed by a custom resolver (e.g. a `CachingKeyResolver`)
    pub fn with_resolver(resolver: R) -> Self {
        Self {
            resolver,
            clock: system_clock,
        }
    }

    /// Replace the clock used for `exp`/`nbf` checks
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// The key resolver
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Verify a grant token offline
    ///
    /// # Errors
    ///
    /// One [`GrantexTokenError`] variant per failure kind; see the module
    /// docs for the order in which checks run.
    pub async fn verify_grant_token(
        &self,
        token: &str,
        options: &VerifyOptions,
    ) -> Result<VerifiedGrant> {
        let header = decoder::decode_header(token)?;
        SignatureVerifier::check_algorithm(&header)?;

        let key = self
            .resolver
            .resolve(&options.jwks_uri, header.kid.as_deref())
            .await
            .inspect_err(|e| {
                warn!(
                    jwks_uri = %options.jwks_uri,
                    kid = ?header.kid,
                    error = %e,
                    "Signing key resolution failed"
                );
            })?;

        let payload = SignatureVerifier::new()
            .with_clock_tolerance(options.clock_tolerance)
            .with_audience(options.audience.clone())
            .with_clock(self.clock)
            .verify(token, &key)
            .inspect_err(|e| warn!(code = e.code(), error = %e, "Grant token rejected"))?;

        scope::enforce(&payload.scp, &options.required_scopes)?;

        debug!(
            jti = %payload.jti,
            grant_id = %payload.grant_id(),
            kid = ?key.kid(),
            "Grant token verified"
        );

        Ok(VerifiedGrant::from(payload))
    }

    /// Decode a token the authorization service has already verified
    ///
    /// No signature, time, audience or scope checks run. Never call this on
    /// a token of untrusted origin.
    ///
    /// # Errors
    ///
    /// [`GrantexTokenError::MalformedToken`] or
    /// [`GrantexTokenError::MissingClaims`].
    pub fn decode_trusted(&self, token: &str) -> Result<VerifiedGrant> {
        decode_trusted(token)
    }
}

/// Verify a grant token with a fresh uncached HTTP resolver
///
/// Performs exactly one key-set fetch per call (none when the algorithm is
/// rejected). Prefer a shared [`GrantVerifier`] with a
/// [`crate::jwt::CachingKeyResolver`] on hot paths.
///
/// # Errors
///
/// See [`GrantVerifier::verify_grant_token`].
pub async fn verify_grant_token(token: &str, options: &VerifyOptions) -> Result<VerifiedGrant> {
    GrantVerifier::new()?
        .verify_grant_token(token, options)
        .await
}

/// Decode a server-attested grant token without verifying its signature
///
/// # Errors
///
/// [`GrantexTokenError::MalformedToken`] or
/// [`GrantexTokenError::MissingClaims`].
pub fn decode_trusted(token: &str) -> Result<VerifiedGrant> {
    let claims = decoder::decode_claims_unverified(token)?;
    let payload = GrantTokenPayload::from_claims(claims).map_err(|e| match e {
        GrantexTokenError::MalformedToken(detail) => {
            GrantexTokenError::MalformedToken(format!("failed to decode grant token: {detail}"))
        }
        other => other,
    })?;
    Ok(VerifiedGrant::from(payload))
}
