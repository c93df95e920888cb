//! # Grantex Verify - Offline Grant Token Verification
//!
//! Verifies grant tokens: RS256-signed JWTs in which a principal (end user)
//! delegates a set of scopes to an agent, issued by the Grantex authorization
//! service. Also verifies webhook signatures.
//!
//! ## Design Principles
//!
//! - **Pinned algorithm**: only RS256; anything else is rejected before the
//!   key set is fetched
//! - **Typed failures**: one [`GrantexTokenError`] variant per failure kind,
//!   with HTTP status and code helpers for middleware
//! - **Stateless core**: every call is independent; caching is an opt-in
//!   decorator ([`jwt::CachingKeyResolver`]) over the same resolver contract
//!
//! ## Architecture
//!
//! - [`jwt`] - decoding, key-set resolution, caching, signature validation
//! - [`scope`] - required-scope enforcement
//! - [`verifier`] - the verification service tying the above together
//! - [`webhook`] - HMAC-SHA256 webhook signatures
//! - [`claims`] - `GrantTokenPayload` and `VerifiedGrant`
//! - [`config`] - `VerifyOptions`, resolver and cache configuration
//! - [`error`] - error types
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use grantex_verify::{VerifyOptions, verify_grant_token};
//!
//! # tokio_test::block_on(async {
//! let options = VerifyOptions::new("https://auth.grantex.dev/.well-known/jwks.json")
//!     .with_required_scopes(["calendar:read"])
//!     .with_clock_tolerance(5);
//!
//! match verify_grant_token("eyJhbGciOiJSUzI1NiIs...", &options).await {
//!     Ok(grant) => println!("{} may read {}'s calendar", grant.agent_did, grant.principal_id),
//!     Err(e) => println!("rejected ({}): {e}", e.status_code()),
//! }
//! # });
//! ```

pub mod bearer;
pub mod claims;
pub mod config;
pub mod error;
pub mod jwt;
pub mod scope;
pub mod verifier;
pub mod webhook;

#[doc(inline)]
pub use bearer::extract_bearer_token;
#[doc(inline)]
pub use claims::{GrantTokenPayload, REQUIRED_CLAIMS, VerifiedGrant};
#[doc(inline)]
pub use config::{CacheConfig, ResolverConfig, VerifyOptions};
#[doc(inline)]
pub use error::{GrantexTokenError, KeyResolutionError, Result};
#[doc(inline)]
pub use verifier::{GrantVerifier, decode_trusted, verify_grant_token};
#[doc(inline)]
pub use webhook::{sign_webhook_payload, verify_webhook_signature};
