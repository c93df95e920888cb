//! JWT infrastructure for grant tokens
//!
//! ```text
//!  token ──► decoder ──► validator::check_algorithm ──► jwks (KeyResolver)
//!                                                          │
//!            claims ◄── validator::verify (RS256, exp/nbf/aud) ◄┘
//! ```
//!
//! # Modules
//!
//! - `decoder` - unverified header/claim decoding
//! - `jwks` - key-set fetching, key selection, JWK → RSA key conversion
//! - `cache` - caching decorator over any `KeyResolver`
//! - `validator` - RS256 signature and claim validation

pub mod cache;
pub mod decoder;
pub mod jwks;
pub mod validator;

// Re-export commonly used types
pub use cache::CachingKeyResolver;
pub use decoder::{TokenHeader, decode_claims_unverified, decode_header};
pub use jwks::{JwkRecord, JwksResolver, KeyResolver, KeySet, RsaPublicKey, select_key};
pub use validator::{Clock, PINNED_ALGORITHM, SignatureVerifier, system_clock};
