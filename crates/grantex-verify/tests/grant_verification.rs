//! End-to-end grant token verification against a mock key set

mod common;

use common::*;
use grantex_verify::{GrantexTokenError, KeyResolutionError, VerifyOptions, decode_trusted};
use jsonwebtoken::Algorithm;
use pretty_assertions::assert_eq;
use serde_json::json;

fn scenario_a_claims() -> serde_json::Value {
    json!({
        "sub": "user_abc123",
        "agt": "did:grantex:ag_1",
        "dev": "org_test",
        "scp": ["calendar:read"],
        "iat": 1_700_000_000,
        "exp": 9_999_999_999_i64,
        "jti": "tok_1",
        "grnt": "grnt_1"
    })
}

#[tokio::test]
async fn test_valid_token_maps_to_verified_grant() {
    let jwks = MockJwksServer::start().await;
    jwks.publish(vec![jwk_1()], 1).await;

    let token = sign(&scenario_a_claims(), SIGNING_KEY_1, Some("key-1"));
    let grant = verifier()
        .verify_grant_token(&token, &VerifyOptions::new(jwks.jwks_uri()))
        .await
        .unwrap();

    assert_eq!(grant.token_id, "tok_1");
    assert_eq!(grant.grant_id, "grnt_1");
    assert_eq!(grant.principal_id, "user_abc123");
    assert_eq!(grant.agent_did, "did:grantex:ag_1");
    assert_eq!(grant.developer_id, "org_test");
    assert_eq!(grant.scopes, vec!["calendar:read".to_string()]);
    assert_eq!(grant.issued_at, 1_700_000_000);
    assert_eq!(grant.expires_at, 9_999_999_999);
    assert_eq!(grant.parent_agent_did, None);
    assert_eq!(grant.delegation_depth, None);
}

#[tokio::test]
async fn test_grant_id_falls_back_to_token_id() {
    let jwks = MockJwksServer::start().await;
    jwks.publish(vec![jwk_1()], 1).await;

    let mut claims = scenario_a_claims();
    claims.as_object_mut().unwrap().remove("grnt");
    let token = sign(&claims, SIGNING_KEY_1, Some("key-1"));

    let grant = verifier()
        .verify_grant_token(&token, &VerifyOptions::new(jwks.jwks_uri()))
        .await
        .unwrap();
    assert_eq!(grant.grant_id, "tok_1");
}

#[tokio::test]
async fn test_scopes_preserve_issuer_order() {
    let jwks = MockJwksServer::start().await;
    jwks.publish(vec![jwk_1()], 1).await;

    let scopes = ["payments:initiate:max_500", "calendar:read", "email:send"];
    let mut claims = grant_claims();
    claims["scp"] = json!(scopes);
    let token = sign(&claims, SIGNING_KEY_1, Some("key-1"));

    let grant = verifier()
        .verify_grant_token(&token, &VerifyOptions::new(jwks.jwks_uri()))
        .await
        .unwrap();
    assert_eq!(grant.scopes, scopes.map(String::from).to_vec());
    assert_eq!(grant.grant_id, "grnt_01HXYZ");
}

#[tokio::test]
async fn test_delegation_claims_pass_through() {
    let jwks = MockJwksServer::start().await;
    jwks.publish(vec![jwk_1()], 1).await;

    let mut claims = grant_claims();
    claims["parentAgt"] = json!("did:grantex:ag_parent");
    claims["parentGrnt"] = json!("grnt_parent");
    claims["delegationDepth"] = json!(1);
    let token = sign(&claims, SIGNING_KEY_1, Some("key-1"));

    let grant = verifier()
        .verify_grant_token(&token, &VerifyOptions::new(jwks.jwks_uri()))
        .await
        .unwrap();
    assert_eq!(grant.parent_agent_did.as_deref(), Some("did:grantex:ag_parent"));
    assert_eq!(grant.parent_grant_id.as_deref(), Some("grnt_parent"));
    assert_eq!(grant.delegation_depth, Some(1));
}

#[tokio::test]
async fn test_non_rs256_rejected_before_fetch() {
    let jwks = MockJwksServer::start().await;
    jwks.publish(vec![jwk_1()], 0).await;
    let options = VerifyOptions::new(jwks.jwks_uri());
    let claims = grant_claims();

    let forged = [
        ("HS256", forge(&json!({"alg": "HS256", "typ": "JWT"}), &claims, b"mac")),
        ("none", forge(&json!({"alg": "none"}), &claims, b"")),
        ("ES256", forge(&json!({"alg": "ES256", "kid": "key-1"}), &claims, &[7; 64])),
        ("RS512", sign_with(&claims, SIGNING_KEY_1, Some("key-1"), Algorithm::RS512)),
        ("PS256", sign_with(&claims, SIGNING_KEY_1, Some("key-1"), Algorithm::PS256)),
    ];

    for (alg, token) in forged {
        match verifier().verify_grant_token(&token, &options).await {
            Err(GrantexTokenError::UnsupportedAlgorithm(got)) => assert_eq!(got, alg),
            other => panic!("{alg}: expected UnsupportedAlgorithm, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_expiry_boundary_honours_clock_tolerance() {
    let jwks = MockJwksServer::start().await;
    jwks.publish(vec![jwk_1()], 2).await;

    let mut claims = grant_claims();
    claims["exp"] = json!(NOW - 1);
    let token = sign(&claims, SIGNING_KEY_1, Some("key-1"));

    let strict = VerifyOptions::new(jwks.jwks_uri());
    let err = verifier()
        .verify_grant_token(&token, &strict)
        .await
        .unwrap_err();
    assert!(err.is_expired());
    assert_eq!(err.code(), "TOKEN_EXPIRED");

    let lenient = strict.with_clock_tolerance(1);
    let grant = verifier()
        .verify_grant_token(&token, &lenient)
        .await
        .unwrap();
    assert_eq!(grant.expires_at, NOW - 1);
}

#[tokio::test]
async fn test_not_yet_valid_token_rejected() {
    let jwks = MockJwksServer::start().await;
    jwks.publish(vec![jwk_1()], 1).await;

    let mut claims = grant_claims();
    claims["nbf"] = json!(NOW + 120);
    let token = sign(&claims, SIGNING_KEY_1, Some("key-1"));

    let err = verifier()
        .verify_grant_token(&token, &VerifyOptions::new(jwks.jwks_uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, GrantexTokenError::NotYetValid { not_before } if not_before == NOW + 120));
}

#[tokio::test]
async fn test_required_scope_subset_accepted() {
    let jwks = MockJwksServer::start().await;
    jwks.publish(vec![jwk_1()], 1).await;

    let mut claims = grant_claims();
    claims["scp"] = json!(["calendar:read", "payments:initiate:max_500"]);
    let token = sign(&claims, SIGNING_KEY_1, Some("key-1"));

    let options = VerifyOptions::new(jwks.jwks_uri()).with_required_scopes(["calendar:read"]);
    assert!(verifier().verify_grant_token(&token, &options).await.is_ok());
}

#[tokio::test]
async fn test_missing_scopes_listed_in_error() {
    let jwks = MockJwksServer::start().await;
    jwks.publish(vec![jwk_1()], 2).await;

    let mut claims = grant_claims();
    claims["scp"] = json!(["calendar:read", "payments:initiate:max_500"]);
    let token = sign(&claims, SIGNING_KEY_1, Some("key-1"));

    let options = VerifyOptions::new(jwks.jwks_uri())
        .with_required_scopes(["calendar:read", "admin:all"]);
    let err = verifier()
        .verify_grant_token(&token, &options)
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("admin:all"));
    assert!(!message.contains("calendar:read"));
    assert_eq!(err.status_code(), 403);
    assert_eq!(err.code(), "SCOPE_INSUFFICIENT");

    let token = sign(&scenario_a_claims(), SIGNING_KEY_1, Some("key-1"));
    let options = VerifyOptions::new(jwks.jwks_uri()).with_required_scopes(["email:send"]);
    let err = verifier()
        .verify_grant_token(&token, &options)
        .await
        .unwrap_err();
    match &err {
        GrantexTokenError::InsufficientScope { missing } => {
            assert_eq!(missing, &vec!["email:send".to_string()]);
        }
        other => panic!("expected InsufficientScope, got {other:?}"),
    }
    assert_eq!(err.to_string(), "grant token is missing required scopes: email:send");
}

#[tokio::test]
async fn test_signature_from_other_key_rejected() {
    let jwks = MockJwksServer::start().await;
    jwks.publish(vec![jwk_1()], 1).await;

    let token = sign(&grant_claims(), SIGNING_KEY_2, Some("key-1"));
    let err = verifier()
        .verify_grant_token(&token, &VerifyOptions::new(jwks.jwks_uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, GrantexTokenError::SignatureInvalid));
    assert_eq!(err.status_code(), 401);
}

#[tokio::test]
async fn test_tampered_payload_rejected() {
    let jwks = MockJwksServer::start().await;
    jwks.publish(vec![jwk_1()], 1).await;

    let token = sign(&grant_claims(), SIGNING_KEY_1, Some("key-1"));
    let parts: Vec<&str> = token.split('.').collect();

    let mut escalated = grant_claims();
    escalated["scp"] = json!(["admin:all"]);
    let tampered = format!(
        "{}.{}.{}",
        parts[0],
        base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            escalated.to_string()
        ),
        parts[2]
    );

    let err = verifier()
        .verify_grant_token(&tampered, &VerifyOptions::new(jwks.jwks_uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, GrantexTokenError::SignatureInvalid));
}

#[tokio::test]
async fn test_missing_required_claims_reported() {
    let jwks = MockJwksServer::start().await;
    jwks.publish(vec![jwk_1()], 1).await;

    let mut claims = grant_claims();
    let object = claims.as_object_mut().unwrap();
    object.remove("agt");
    object.remove("dev");
    let token = sign(&claims, SIGNING_KEY_1, Some("key-1"));

    let err = verifier()
        .verify_grant_token(&token, &VerifyOptions::new(jwks.jwks_uri()))
        .await
        .unwrap_err();
    match err {
        GrantexTokenError::MissingClaims { missing } => {
            assert_eq!(missing, vec!["agt".to_string(), "dev".to_string()]);
        }
        other => panic!("expected MissingClaims, got {other:?}"),
    }
}

#[tokio::test]
async fn test_audience_checked_when_configured() {
    let jwks = MockJwksServer::start().await;
    jwks.publish(vec![jwk_1()], 3).await;

    let mut claims = grant_claims();
    claims["aud"] = json!(["https://api.example.com", "https://other.example.com"]);
    let token = sign(&claims, SIGNING_KEY_1, Some("key-1"));
    let options = VerifyOptions::new(jwks.jwks_uri());

    let matching = options.clone().with_audience("https://other.example.com");
    assert!(verifier().verify_grant_token(&token, &matching).await.is_ok());

    let mismatched = options.clone().with_audience("https://evil.example.com");
    let err = verifier()
        .verify_grant_token(&token, &mismatched)
        .await
        .unwrap_err();
    assert!(matches!(err, GrantexTokenError::AudienceMismatch { .. }));

    // Tokens without `aud` are accepted even when an audience is configured
    let token = sign(&grant_claims(), SIGNING_KEY_1, Some("key-1"));
    assert!(verifier().verify_grant_token(&token, &matching).await.is_ok());
}

#[tokio::test]
async fn test_malformed_tokens_rejected_before_fetch() {
    let jwks = MockJwksServer::start().await;
    jwks.publish(vec![jwk_1()], 0).await;
    let options = VerifyOptions::new(jwks.jwks_uri());

    for token in ["", "abc", "a.b", "a.b.c.d", "!!!.e30.sig"] {
        let err = verifier()
            .verify_grant_token(token, &options)
            .await
            .unwrap_err();
        assert!(
            matches!(err, GrantexTokenError::MalformedToken(_)),
            "token {token:?} gave {err:?}"
        );
    }
}

#[tokio::test]
async fn test_key_set_failure_surfaces_as_key_resolution() {
    let jwks = MockJwksServer::start().await;
    jwks.respond(wiremock::ResponseTemplate::new(503), 1).await;

    let token = sign(&grant_claims(), SIGNING_KEY_1, Some("key-1"));
    let err = verifier()
        .verify_grant_token(&token, &VerifyOptions::new(jwks.jwks_uri()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GrantexTokenError::KeyResolution(KeyResolutionError::FetchFailed { .. })
    ));
    assert_eq!(err.code(), "KEY_RESOLUTION_FAILED");
}

#[test]
fn test_decode_trusted_reads_signed_token() {
    let token = sign(&scenario_a_claims(), SIGNING_KEY_1, Some("key-1"));
    let grant = decode_trusted(&token).unwrap();
    assert_eq!(grant.token_id, "tok_1");
    assert_eq!(grant.grant_id, "grnt_1");
    assert_eq!(grant.scopes, vec!["calendar:read".to_string()]);
}
