//! Wallet signing types — `POST /wallet/sign-typed-data` and `POST /wallet/sign-message`.
//!
//! These endpoints sign on the service side with the agent's custodial
//! wallet. They are unrelated to the challenge signature, which is produced
//! locally by the runtime's signer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured data to sign, in the EIP-712 shape the service expects.
///
/// The runtime does not interpret `domain`, `types` or `message`; it
/// forwards them as given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    pub domain: Map<String, Value>,
    pub types: Map<String, Value>,
    pub primary_type: String,
    pub message: Map<String, Value>,
}

/// Body of `POST /wallet/sign-message`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignMessageRequest {
    pub message: String,
}

/// Response of both wallet signing endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignatureResponse {
    pub signature: String,
}
