//! Common test utilities for grant verification integration tests

#![allow(dead_code)]

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use grantex_verify::GrantVerifier;
use grantex_verify::jwt::JwksResolver;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fixed "now" used by every deterministic clock in these tests
pub const NOW: i64 = 1_800_000_000;

pub const SIGNING_KEY_1: &str = include_str!("../fixtures/signing-key-1.pem");
pub const SIGNING_KEY_2: &str = include_str!("../fixtures/signing-key-2.pem");

const JWK_1: &str = include_str!("../fixtures/signing-key-1.jwk.json");
const JWK_2: &str = include_str!("../fixtures/signing-key-2.jwk.json");

pub fn fixed_clock() -> i64 {
    NOW
}

/// Public JWK of signing key 1 (`kid = "key-1"`)
pub fn jwk_1() -> Value {
    serde_json::from_str(JWK_1).unwrap()
}

/// Public JWK of signing key 2 (`kid = "key-2"`)
pub fn jwk_2() -> Value {
    serde_json::from_str(JWK_2).unwrap()
}

/// Mock authorization server publishing a key set at `/jwks`
pub struct MockJwksServer {
    pub server: MockServer,
}

impl MockJwksServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn jwks_uri(&self) -> String {
        format!("{}/jwks", self.server.uri())
    }

    /// Publish `keys`, asserting the key set is fetched exactly `fetches` times
    pub async fn publish(&self, keys: Vec<Value>, fetches: u64) {
        self.respond(
            ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })),
            fetches,
        )
        .await;
    }

    pub async fn respond(&self, response: ResponseTemplate, fetches: u64) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(response)
            .expect(fetches)
            .mount(&self.server)
            .await;
    }
}

/// Verifier over an uncached resolver with the clock pinned to [`NOW`]
pub fn verifier() -> GrantVerifier<JwksResolver> {
    GrantVerifier::with_resolver(JwksResolver::new().unwrap()).with_clock(fixed_clock)
}

/// Claims of a valid grant token relative to [`NOW`]
pub fn grant_claims() -> Value {
    json!({
        "iss": "https://auth.grantex.dev",
        "sub": "user_abc123",
        "agt": "did:grantex:ag_01HXYZ",
        "dev": "org_test",
        "scp": ["calendar:read", "email:send"],
        "iat": NOW - 60,
        "exp": NOW + 3600,
        "jti": "tok_01HXYZ",
        "grnt": "grnt_01HXYZ"
    })
}

/// Sign `claims` with RS256 under `pem`, stamping `kid` into the header
pub fn sign(claims: &Value, pem: &str, kid: Option<&str>) -> String {
    sign_with(claims, pem, kid, Algorithm::RS256)
}

pub fn sign_with(claims: &Value, pem: &str, kid: Option<&str>, alg: Algorithm) -> String {
    let mut header = Header::new(alg);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

/// Assemble a token from raw header, claims and signature parts
pub fn forge(header: &Value, claims: &Value, signature: &[u8]) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        URL_SAFE_NO_PAD.encode(signature)
    )
}
