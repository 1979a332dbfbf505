//! Standard error response body returned by the identity service.

use serde::{Deserialize, Serialize};

/// The JSON body returned for error responses.
///
/// ```json
/// { "error": "refresh token revoked", "code": "invalid_grant" }
/// ```
///
/// `code` is optional because not every deployment of the service sends it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Human-readable description of the problem.
    pub error: String,

    /// Machine-readable error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            error: error.into(),
        }
    }
}

/// Error codes the service is known to emit.
pub mod codes {
    pub const INVALID_REQUEST: &str = "invalid_request";
    pub const INVALID_CHALLENGE: &str = "invalid_challenge";
    pub const INVALID_SIGNATURE: &str = "invalid_signature";
    pub const INVALID_GRANT: &str = "invalid_grant";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const NOT_FOUND: &str = "not_found";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_optional() {
        let e: ErrorResponse = serde_json::from_str(r#"{"error":"nope"}"#).unwrap();
        assert_eq!(e.error, "nope");
        assert!(e.code.is_none());
    }

    #[test]
    fn new_sets_code() {
        let e = ErrorResponse::new(codes::INVALID_GRANT, "refresh token revoked");
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("invalid_grant"));
    }
}
