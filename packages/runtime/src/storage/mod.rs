//! Storage port for credentials that must outlive the process.
//!
//! The [`Storage`] trait is a plain string key/value contract. The token
//! manager uses a single key, [`REFRESH_TOKEN_KEY`]; everything else about
//! persistence (location, encryption, sharing between processes) belongs to
//! the implementation.
//!
//! # Implementations
//!
//! | Type | When to use |
//! |------|-------------|
//! | [`MemoryStorage`] | Tests, short-lived agents |
//! | [`SqliteStorage`] | Durable single-file store; survives restarts |
//!
//! [`MemoryStorage`]: memory::MemoryStorage
//! [`SqliteStorage`]: sqlite::SqliteStorage

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

/// The key under which the refresh token is persisted.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Errors that storage operations can return.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// An unexpected error in the underlying storage backend.
    #[error("internal storage error: {0}")]
    Internal(String),
}

/// Persistence contract for the runtime.
///
/// Implementations must be `Send + Sync + 'static` so they can be held in an
/// `Arc<dyn Storage>` and called from concurrent tasks.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Return the value stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Idempotent (no error if it didn't exist).
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}
