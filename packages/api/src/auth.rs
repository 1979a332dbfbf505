//! Challenge-response and token types — `POST /auth/{challenge,exchange,refresh}`.
//!
//! An agent proves possession of its wallet key in three steps:
//!
//! ```text
//! POST /auth/challenge  { agentRef, credentialId }      -> { id, payload }
//!      signer(id, payload)                              -> signature
//! POST /auth/exchange   { challengeId, signature }      -> { accessToken, refreshToken }
//! ```
//!
//! The refresh token can later be traded for a new access token without
//! signing again:
//!
//! ```text
//! POST /auth/refresh    { refreshToken }                -> { accessToken, refreshToken? }
//! ```

use serde::{Deserialize, Serialize};

/// Body of `POST /auth/challenge`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    /// The agent the credential is being issued for.
    pub agent_ref: String,

    /// The wallet credential that will sign the challenge.
    pub credential_id: String,

    /// Scopes requested for the resulting access token. Omitted from the
    /// wire when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

/// A short-lived, single-use challenge issued by the identity service.
///
/// Never persisted. Consumed by exactly one [`ExchangeRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Challenge {
    pub id: String,
    pub payload: String,
}

/// Body of `POST /auth/exchange`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest {
    pub challenge_id: String,
    pub signature: String,
}

/// Response of `POST /auth/exchange`.
///
/// # Example
///
/// ```json
/// { "accessToken": "AT1", "refreshToken": "RT1" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,

    /// Absent when the service does not issue refresh tokens for this
    /// credential; the agent then re-authenticates from scratch each time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Body of `POST /auth/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response of `POST /auth/refresh`.
///
/// `refresh_token` is present only when the service rotates it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn challenge_request_uses_camel_case() {
        let req = ChallengeRequest {
            agent_ref: "a1".into(),
            credential_id: "c1".into(),
            scopes: vec![],
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "agentRef": "a1", "credentialId": "c1" })
        );
    }

    #[test]
    fn challenge_request_includes_scopes_when_set() {
        let req = ChallengeRequest {
            agent_ref: "a1".into(),
            credential_id: "c1".into(),
            scopes: vec!["agents:read".into()],
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["scopes"], json!(["agents:read"]));
    }

    #[test]
    fn exchange_request_shape() {
        let req = ExchangeRequest {
            challenge_id: "ch1".into(),
            signature: "sig".into(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "challengeId": "ch1", "signature": "sig" })
        );
    }

    #[test]
    fn refresh_response_without_rotation() {
        let resp: RefreshResponse =
            serde_json::from_value(json!({ "accessToken": "AT2" })).unwrap();
        assert_eq!(resp.access_token, "AT2");
        assert!(resp.refresh_token.is_none());
    }

    #[test]
    fn token_pair_missing_access_token_is_rejected() {
        let result = serde_json::from_value::<TokenPair>(json!({ "refreshToken": "RT1" }));
        assert!(result.is_err());
    }
}
