//! JWKS (JSON Web Key Set) fetching and signing-key selection
//!
//! - [`KeyResolver`] is the resolver seam; [`JwksResolver`] fetches over HTTP
//!   on every call, and [`super::CachingKeyResolver`] wraps any resolver.
//! - [`select_key`] and [`RsaPublicKey::from_jwk`] are pure and work on
//!   static fixtures.
//!
//! # Key selection
//!
//! 1. If the token carries a `kid`, the first record with that exact `kid`.
//! 2. Otherwise, or when nothing matches, the first record with `kty == "RSA"`.
//! 3. Otherwise [`KeyResolutionError::NoMatchingKey`].

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::DecodingKey;
use rsa::BigUint;
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::ResolverConfig;
use crate::error::KeyResolutionError;

/// A single public-key record from a key-set document
///
/// Only the fields needed for RSA are typed; everything else is kept in
/// `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JwkRecord {
    /// Key type (`RSA`, `EC`, ...)
    #[serde(default)]
    pub kty: Option<String>,
    /// Key identifier
    #[serde(default)]
    pub kid: Option<String>,
    /// RSA modulus, base64url
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent, base64url
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// Remaining JWK members (`use`, `alg`, curve parameters, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JwkRecord {
    fn is_rsa(&self) -> bool {
        self.kty.as_deref() == Some("RSA")
    }
}

/// Key-set document (`{"keys": [...]}`)
///
/// Parsing is lenient per record: an entry that is not a JWK object, or
/// whose `kty`/`kid`/`n`/`e` are not strings, is skipped rather than failing
/// the whole document. A missing, `null` or non-array `keys` member parses as
/// an empty set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawKeySet")]
pub struct KeySet {
    /// Public-key records in published order
    pub keys: Vec<JwkRecord>,
}

#[derive(Deserialize)]
struct RawKeySet {
    #[serde(default)]
    keys: serde_json::Value,
}

impl From<RawKeySet> for KeySet {
    fn from(raw: RawKeySet) -> Self {
        let serde_json::Value::Array(entries) = raw.keys else {
            return Self::default();
        };

        let keys = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                serde_json::from_value::<JwkRecord>(entry)
                    .inspect_err(|e| debug!(index, error = %e, "Skipping unparseable JWK record"))
                    .ok()
            })
            .collect();

        Self { keys }
    }
}

impl KeySet {
    /// Whether a record with exactly this `kid` is published
    pub fn contains_kid(&self, kid: &str) -> bool {
        self.keys.iter().any(|k| k.kid.as_deref() == Some(kid))
    }
}

/// RSA public key ready for RS256 verification
#[derive(Clone)]
pub struct RsaPublicKey {
    kid: Option<String>,
    decoding_key: DecodingKey,
}

// DecodingKey carries no useful Debug output
impl fmt::Debug for RsaPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaPublicKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl RsaPublicKey {
    /// Build a key from a JWK record's modulus and exponent
    ///
    /// # Errors
    ///
    /// [`KeyResolutionError::InvalidKeyMaterial`] if the record is not an RSA
    /// key, its `n`/`e` are missing, empty, or not base64url, or they do not
    /// form a usable RSA public key (odd modulus of at least
    /// [`MIN_MODULUS_BITS`], odd exponent).
    pub fn from_jwk(jwk: &JwkRecord) -> Result<Self, KeyResolutionError> {
        if !jwk.is_rsa() {
            return Err(KeyResolutionError::InvalidKeyMaterial(format!(
                "key type {:?} is not RSA",
                jwk.kty
            )));
        }

        let (n, n_bytes) = component(jwk.n.as_deref(), "n")?;
        let (e, e_bytes) = component(jwk.e.as_deref(), "e")?;
        check_rsa_numbers(&n_bytes, &e_bytes)?;

        let decoding_key = DecodingKey::from_rsa_components(n, e)
            .map_err(|err| KeyResolutionError::InvalidKeyMaterial(err.to_string()))?;

        Ok(Self {
            kid: jwk.kid.clone(),
            decoding_key,
        })
    }

    /// Key identifier of the record this key was built from
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

/// Check an RSA component is present and decodes as unpadded base64url
fn component<'a>(
    value: Option<&'a str>,
    name: &str,
) -> Result<(&'a str, Vec<u8>), KeyResolutionError> {
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| KeyResolutionError::InvalidKeyMaterial(format!("missing RSA '{name}'")))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|err| {
            KeyResolutionError::InvalidKeyMaterial(format!("RSA '{name}' is not base64url: {err}"))
        })?;

    if bytes.iter().all(|b| *b == 0) {
        return Err(KeyResolutionError::InvalidKeyMaterial(format!(
            "RSA '{name}' is zero"
        )));
    }

    Ok((value, bytes))
}

/// Smallest accepted RSA modulus
pub const MIN_MODULUS_BITS: usize = 2048;

/// Reject modulus/exponent pairs no RS256 signature could verify against
///
/// The pair must form an `rsa` public key (modulus at most 4096 bits,
/// exponent between 2 and 2^33 - 1). The modulus must also be odd and at
/// least [`MIN_MODULUS_BITS`] long, and the exponent odd.
fn check_rsa_numbers(n: &[u8], e: &[u8]) -> Result<(), KeyResolutionError> {
    let invalid = KeyResolutionError::InvalidKeyMaterial;

    let key = rsa::RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))
        .map_err(|err| invalid(format!("unusable RSA public key: {err}")))?;

    let bits = key.n().bits();
    if bits < MIN_MODULUS_BITS {
        return Err(invalid(format!(
            "RSA modulus is {bits} bits, at least {MIN_MODULUS_BITS} required"
        )));
    }
    if n.last().is_some_and(|b| b & 1 == 0) {
        return Err(invalid("RSA modulus is even".to_string()));
    }
    if e.last().is_some_and(|b| b & 1 == 0) {
        return Err(invalid("RSA exponent is even".to_string()));
    }

    Ok(())
}

/// Pick the signing key record for `kid`
///
/// # Errors
///
/// [`KeyResolutionError::EmptyKeySet`] for a set without keys,
/// [`KeyResolutionError::NoMatchingKey`] when neither a `kid` match nor an RSA
/// key exists.
pub fn select_key<'a>(
    key_set: &'a KeySet,
    kid: Option<&str>,
) -> Result<&'a JwkRecord, KeyResolutionError> {
    if key_set.keys.is_empty() {
        return Err(KeyResolutionError::EmptyKeySet);
    }

    let by_kid = kid.and_then(|kid| key_set.keys.iter().find(|k| k.kid.as_deref() == Some(kid)));

    by_kid
        .or_else(|| {
            if kid.is_some() {
                debug!(kid = ?kid, "No JWK with matching kid, falling back to first RSA key");
            }
            key_set.keys.iter().find(|k| k.is_rsa())
        })
        .ok_or_else(|| KeyResolutionError::NoMatchingKey {
            kid: kid.map(str::to_string),
        })
}

/// Resolves the public key that signed a token
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Fetch the key-set document published at `jwks_uri`
    async fn fetch_key_set(&self, jwks_uri: &str) -> Result<KeySet, KeyResolutionError>;

    /// Fetch the key set and select the key for `kid`
    async fn resolve(
        &self,
        jwks_uri: &str,
        kid: Option<&str>,
    ) -> Result<RsaPublicKey, KeyResolutionError> {
        let key_set = self.fetch_key_set(jwks_uri).await?;
        RsaPublicKey::from_jwk(select_key(&key_set, kid)?)
    }
}

#[async_trait]
impl<R: KeyResolver + ?Sized> KeyResolver for std::sync::Arc<R> {
    async fn fetch_key_set(&self, jwks_uri: &str) -> Result<KeySet, KeyResolutionError> {
        (**self).fetch_key_set(jwks_uri).await
    }

    async fn resolve(
        &self,
        jwks_uri: &str,
        kid: Option<&str>,
    ) -> Result<RsaPublicKey, KeyResolutionError> {
        (**self).resolve(jwks_uri, kid).await
    }
}

/// HTTP key-set resolver
///
/// Performs exactly one GET per call with a bounded timeout. It neither
/// caches nor retries; wrap it in [`super::CachingKeyResolver`] for caching.
///
/// # Example
///
/// ```rust,no_run
/// # use grantex_verify::jwt::{JwksResolver, KeyResolver};
/// # tokio_test::block_on(async {
/// let resolver = JwksResolver::new()?;
/// let key = resolver
///     .resolve("https://auth.grantex.dev/.well-known/jwks.json", Some("key-1"))
///     .await?;
/// println!("resolved {:?}", key.kid());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct JwksResolver {
    http_client: reqwest::Client,
    config: ResolverConfig,
}

impl JwksResolver {
    /// Create a resolver with default settings (10 second timeout, HTTPS only)
    ///
    /// # Errors
    ///
    /// [`KeyResolutionError::HttpClient`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, KeyResolutionError> {
        Self::with_config(ResolverConfig::default())
    }

    /// Create a resolver with custom settings
    ///
    /// # Errors
    ///
    /// [`KeyResolutionError::HttpClient`] if the HTTP client cannot be built.
    pub fn with_config(config: ResolverConfig) -> Result<Self, KeyResolutionError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| KeyResolutionError::HttpClient(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    fn check_uri(&self, jwks_uri: &str) -> Result<(), KeyResolutionError> {
        let failed = |detail: String| KeyResolutionError::FetchFailed {
            uri: jwks_uri.to_string(),
            detail,
        };

        let url = url::Url::parse(jwks_uri).map_err(|e| failed(format!("invalid URI: {e}")))?;
        match url.scheme() {
            "https" => Ok(()),
            "http" if !self.config.require_https || is_loopback(&url) => Ok(()),
            "http" => Err(failed(
                "JWKS endpoint must use HTTPS (HTTP only allowed for loopback hosts)".to_string(),
            )),
            other => Err(failed(format!("unsupported URI scheme '{other}'"))),
        }
    }
}

fn is_loopback(url: &url::Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(url::Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => false,
    }
}

#[async_trait]
impl KeyResolver for JwksResolver {
    async fn fetch_key_set(&self, jwks_uri: &str) -> Result<KeySet, KeyResolutionError> {
        self.check_uri(jwks_uri)?;

        let failed = |detail: String| {
            error!(jwks_uri = %jwks_uri, error = %detail, "Failed to fetch JWKS");
            KeyResolutionError::FetchFailed {
                uri: jwks_uri.to_string(),
                detail,
            }
        };

        debug!(jwks_uri = %jwks_uri, "Fetching JWKS from endpoint");

        let response = self
            .http_client
            .get(jwks_uri)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("endpoint returned status {status}")));
        }

        let key_set: KeySet = response
            .json()
            .await
            .map_err(|e| failed(format!("invalid JWKS format: {e}")))?;

        info!(
            jwks_uri = %jwks_uri,
            key_count = key_set.keys.len(),
            "Fetched JWKS"
        );

        Ok(key_set)
    }
}
