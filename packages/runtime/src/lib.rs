//! Challenge-response authentication and token lifecycle for Keyward agents.
//!
//! The runtime turns three fallible capabilities (a [`Transport`], a
//! [`Signer`] and an optional [`Storage`]) into one idempotent operation:
//! [`TokenManager::ensure_access_token`]. Call it as often and from as many
//! tasks as you like; it returns a cached token when it has one and
//! otherwise runs a single shared refresh or authentication exchange.
//!
//! # Modules
//!
//! | Module | Role |
//! |---|---|
//! | [`storage`] | Key/value port for the refresh token; memory and SQLite backends |
//! | [`signer`] | Port for the wallet that signs challenges |
//! | [`transport`] | Port for HTTP; `reqwest` default |
//! | [`manager`] | Token state machine and single-flight exchanges |
//! | [`client`] | Bearer-authenticated calls to the identity service |
//! | [`runtime`] | [`AgentAuth`] builder tying it all together |

pub mod client;
pub mod config;
pub mod error;
pub mod manager;
pub mod runtime;
pub mod signer;
pub mod storage;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::ApiClient;
pub use config::RuntimeConfig;
pub use error::{AuthError, ClientError, SignerError};
pub use manager::{TokenManager, TokenState};
pub use runtime::{AgentAuth, AgentAuthBuilder};
pub use signer::Signer;
pub use storage::{memory::MemoryStorage, sqlite::SqliteStorage, Storage, StorageError};
pub use transport::{
    HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, TransportError,
};
