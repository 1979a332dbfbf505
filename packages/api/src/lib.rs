//! Request and response types for the Keyward identity service API.
//!
//! This crate encodes the HTTP contract between an agent and the identity
//! service as Rust types. It has no I/O; the runtime crate and the mock
//! service in the conformance suite both build on it so the two sides can
//! never drift apart.
//!
//! All bodies are JSON with `camelCase` field names.
//!
//! # Endpoints covered
//!
//! | Method | Path | Type |
//! |--------|------|------|
//! | POST | `/auth/challenge` | [`ChallengeRequest`] → [`Challenge`] |
//! | POST | `/auth/exchange` | [`ExchangeRequest`] → [`TokenPair`] |
//! | POST | `/auth/refresh` | [`RefreshRequest`] → [`RefreshResponse`] |
//! | GET | `/agents/me` | → [`AgentProfile`] |
//! | GET | `/agents` | → [`AgentList`] |
//! | POST | `/wallet/sign-typed-data` | [`TypedData`] → [`SignatureResponse`] |
//! | POST | `/wallet/sign-message` | [`SignMessageRequest`] → [`SignatureResponse`] |

pub mod agent;
pub mod auth;
pub mod error;
pub mod wallet;

pub use agent::{AgentList, AgentProfile};
pub use auth::{
    Challenge, ChallengeRequest, ExchangeRequest, RefreshRequest, RefreshResponse, TokenPair,
};
pub use error::ErrorResponse;
pub use wallet::{SignMessageRequest, SignatureResponse, TypedData};

/// Endpoint paths, relative to the configured base URL.
pub mod paths {
    pub const CHALLENGE: &str = "/auth/challenge";
    pub const EXCHANGE: &str = "/auth/exchange";
    pub const REFRESH: &str = "/auth/refresh";
    pub const AGENT_ME: &str = "/agents/me";
    pub const AGENTS: &str = "/agents";
    pub const SIGN_TYPED_DATA: &str = "/wallet/sign-typed-data";
    pub const SIGN_MESSAGE: &str = "/wallet/sign-message";
}
