//! Grant token claim set and the verified grant handed to callers

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GrantexTokenError, Result};
use crate::scope;

/// Claims every grant token must carry, in reporting order
pub const REQUIRED_CLAIMS: [&str; 7] = ["jti", "sub", "agt", "dev", "scp", "iat", "exp"];

/// Raw claim set inside a grant token
///
/// Wire names are the compact claim names issued by the authorization
/// service (`sub`, `agt`, `dev`, `scp`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantTokenPayload {
    /// Issuer
    #[serde(default)]
    pub iss: String,
    /// Principal identifier
    pub sub: String,
    /// Agent DID
    pub agt: String,
    /// Developer / organization identifier
    pub dev: String,
    /// Granted scopes, in issued order
    pub scp: Vec<String>,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expires at (seconds since epoch)
    pub exp: i64,
    /// Unique token identifier
    pub jti: String,
    /// Grant identifier; `jti` stands in when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grnt: Option<String>,
    /// Not before (seconds since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// DID of the delegating agent
    #[serde(rename = "parentAgt", default, skip_serializing_if = "Option::is_none")]
    pub parent_agt: Option<String>,
    /// Grant the delegation was derived from
    #[serde(rename = "parentGrnt", default, skip_serializing_if = "Option::is_none")]
    pub parent_grnt: Option<String>,
    /// Number of delegation hops from the principal's original grant
    #[serde(
        rename = "delegationDepth",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub delegation_depth: Option<u32>,
}

impl GrantTokenPayload {
    /// Build a payload from a decoded claim object
    ///
    /// A claim that is absent or JSON `null` counts as missing. All missing
    /// required claims are reported together.
    ///
    /// # Errors
    ///
    /// [`GrantexTokenError::MissingClaims`] when a required claim is absent,
    /// [`GrantexTokenError::MalformedToken`] when a claim has the wrong type.
    pub fn from_claims(claims: Map<String, Value>) -> Result<Self> {
        let missing: Vec<String> = REQUIRED_CLAIMS
            .iter()
            .filter(|name| claims.get(**name).is_none_or(Value::is_null))
            .map(|name| (*name).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(GrantexTokenError::MissingClaims { missing });
        }

        serde_json::from_value(Value::Object(claims))
            .map_err(|e| GrantexTokenError::MalformedToken(format!("invalid claim value: {e}")))
    }

    /// Grant identifier, falling back to the token identifier
    pub fn grant_id(&self) -> &str {
        self.grnt.as_deref().unwrap_or(&self.jti)
    }
}

/// Result of a successful verification
///
/// A snapshot owned by the caller; nothing else holds a reference to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedGrant {
    /// Token identifier (`jti`)
    pub token_id: String,
    /// Grant identifier (`grnt`, else `jti`)
    pub grant_id: String,
    /// Principal the grant was issued for (`sub`)
    pub principal_id: String,
    /// Agent acting on the principal's behalf (`agt`)
    pub agent_did: String,
    /// Developer / organization (`dev`)
    pub developer_id: String,
    /// Granted scopes, in issued order
    pub scopes: Vec<String>,
    /// Issued at (seconds since epoch)
    pub issued_at: i64,
    /// Expires at (seconds since epoch)
    pub expires_at: i64,
    /// Delegating agent, for delegated grants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_agent_did: Option<String>,
    /// Parent grant, for delegated grants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_grant_id: Option<String>,
    /// Delegation depth, for delegated grants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation_depth: Option<u32>,
}

impl VerifiedGrant {
    /// Whether `scope` was granted
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Re-check scope requirements without re-verifying the token
    ///
    /// # Errors
    ///
    /// [`GrantexTokenError::InsufficientScope`] listing every missing scope.
    pub fn require_scopes<S: AsRef<str>>(&self, required: &[S]) -> Result<()> {
        scope::enforce(&self.scopes, required)
    }
}

impl From<GrantTokenPayload> for VerifiedGrant {
    fn from(payload: GrantTokenPayload) -> Self {
        Self {
            grant_id: payload.grnt.unwrap_or_else(|| payload.jti.clone()),
            token_id: payload.jti,
            principal_id: payload.sub,
            agent_did: payload.agt,
            developer_id: payload.dev,
            scopes: payload.scp,
            issued_at: payload.iat,
            expires_at: payload.exp,
            parent_agent_did: payload.parent_agt,
            parent_grant_id: payload.parent_grnt,
            delegation_depth: payload.delegation_depth,
        }
    }
}
