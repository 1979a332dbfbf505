//! Agent profile types — `GET /agents/me` and `GET /agents`.
//!
//! The identity service owns the agent record; the runtime only reads it.
//! Fields the runtime does not model are preserved in [`AgentProfile::extra`]
//! so callers can still reach them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An agent as described by the identity service.
///
/// # Example
///
/// ```json
/// {
///   "id": "a1",
///   "name": "Researcher-7",
///   "walletAddress": "0x52908400098527886E0F7030069857D2E4169EE7"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    /// The agent reference used in [`ChallengeRequest::agent_ref`](crate::ChallengeRequest).
    pub id: String,

    /// Human-readable label. OPTIONAL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Address of the wallet bound to this agent. OPTIONAL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,

    /// Any other fields returned by the service, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response body of `GET /agents`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AgentList {
    #[serde(default)]
    pub agents: Vec<AgentProfile>,
}
