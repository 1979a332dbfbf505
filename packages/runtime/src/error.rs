//! Error types surfaced by the runtime.
//!
//! Each port has its own narrow error; [`AuthError`] and [`ClientError`] are
//! what callers of [`TokenManager`](crate::TokenManager) and
//! [`ApiClient`](crate::ApiClient) see. Nothing here is retried internally.

use crate::transport::TransportError;

/// Failure of [`Signer::sign_challenge`](crate::Signer::sign_challenge).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct SignerError(pub String);

/// Failure to obtain an access token.
///
/// `Clone` so that every caller coalesced onto one in-flight exchange can
/// receive the same error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The runtime cannot reach the network at all (e.g. no base URL).
    /// Fatal; calling again will fail the same way.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// `POST /auth/challenge` failed or returned an unusable body.
    #[error("challenge request failed: {0}")]
    ChallengeRequest(String),

    /// The signer refused or failed to sign the challenge.
    #[error("signer failed: {0}")]
    Signer(String),

    /// `POST /auth/exchange` failed or returned an unusable body.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
}

/// Failure of a refresh exchange. Never leaves the token manager: the
/// refresh token is discarded and full authentication takes over.
#[derive(Debug, thiserror::Error)]
pub(crate) enum RefreshError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("identity service returned status {0}")]
    Rejected(u16),
}

/// Failure of a signed API call.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No access token could be obtained.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The service answered with a non-2xx status.
    #[error("API returned {status} {reason}")]
    Api { status: u16, reason: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Request(msg) => ClientError::Transport(msg),
            TransportError::Decode(msg) => ClientError::Decode(msg),
        }
    }
}
