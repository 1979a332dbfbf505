//! In-memory storage implementation.
//!
//! Values are held in RAM behind a [`RwLock`] and are lost when the process
//! exits.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{Storage, StorageError};

/// Thread-safe, in-memory implementation of [`Storage`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a value, e.g. a refresh token saved by an earlier run.
    pub fn with_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
        self
    }

    /// Synchronous read for assertions and diagnostics.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let s = MemoryStorage::new();
        assert_eq!(s.get("refresh_token").await.unwrap(), None);

        s.set("refresh_token", "RT1").await.unwrap();
        assert_eq!(s.get("refresh_token").await.unwrap().as_deref(), Some("RT1"));

        s.set("refresh_token", "RT2").await.unwrap();
        assert_eq!(s.peek("refresh_token").as_deref(), Some("RT2"));

        s.delete("refresh_token").await.unwrap();
        assert_eq!(s.get("refresh_token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_missing_key_is_ok() {
        let s = MemoryStorage::new();
        s.delete("refresh_token").await.unwrap();
    }

    #[tokio::test]
    async fn with_entry_seeds_value() {
        let s = MemoryStorage::new().with_entry("refresh_token", "RT0");
        assert_eq!(s.get("refresh_token").await.unwrap().as_deref(), Some("RT0"));
    }
}
