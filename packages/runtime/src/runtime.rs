//! [`AgentAuth`] — wires the ports, the token manager and the API client
//! together behind one handle.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use keyward_runtime::{AgentAuth, RuntimeConfig, Signer};
//! # async fn run(signer: Arc<dyn Signer>) -> Result<(), Box<dyn std::error::Error>> {
//! let auth = AgentAuth::builder(signer)
//!     .config(RuntimeConfig::new("https://api.example.com", "a1", "c1"))
//!     .connect()
//!     .await?;
//!
//! let me = auth.api().get_agent().await?;
//! println!("{}", me.id);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::warn;

use crate::client::ApiClient;
use crate::config::RuntimeConfig;
use crate::manager::TokenManager;
use crate::signer::Signer;
use crate::storage::Storage;
use crate::transport::{ReqwestTransport, Transport, TransportError};

/// A connected runtime: one [`TokenManager`] and an [`ApiClient`] sharing it.
///
/// Cheap to clone; clones share the same credential pair.
#[derive(Clone)]
pub struct AgentAuth {
    tokens: Arc<TokenManager>,
    api: Arc<ApiClient>,
}

impl AgentAuth {
    pub fn builder(signer: Arc<dyn Signer>) -> AgentAuthBuilder {
        AgentAuthBuilder {
            signer,
            config: RuntimeConfig::default(),
            transport: None,
            storage: None,
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

/// Construction-time options for [`AgentAuth`].
pub struct AgentAuthBuilder {
    signer: Arc<dyn Signer>,
    config: RuntimeConfig,
    transport: Option<Arc<dyn Transport>>,
    storage: Option<Arc<dyn Storage>>,
}

impl AgentAuthBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default [`ReqwestTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Persist the refresh token across restarts.
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Build the runtime and load any persisted refresh token.
    ///
    /// Fails only if the default transport cannot be constructed. A storage
    /// error while loading is logged and the runtime starts unauthenticated.
    pub async fn connect(self) -> Result<AgentAuth, TransportError> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(ReqwestTransport::new()?),
        };

        let tokens = Arc::new(TokenManager::new(
            self.config,
            self.signer,
            Arc::clone(&transport),
            self.storage,
        ));
        if let Err(e) = tokens.load().await {
            warn!(error = %e, "could not load persisted refresh token");
        }

        let api = Arc::new(ApiClient::new(Arc::clone(&tokens), transport));
        Ok(AgentAuth { tokens, api })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use async_trait::async_trait;

    use crate::manager::TokenState;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::{StorageError, REFRESH_TOKEN_KEY};
    use crate::testing::{config, ok, scenario, MockTransport, StaticSigner};

    struct BrokenStorage;

    #[async_trait]
    impl Storage for BrokenStorage {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Internal("disk on fire".into()))
        }
        async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Internal("disk on fire".into()))
        }
        async fn delete(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Internal("disk on fire".into()))
        }
    }

    #[tokio::test]
    async fn connect_loads_persisted_refresh_token() {
        let transport = Arc::new(MockTransport::new(|path, req| match path {
            "/auth/refresh" => ok(json!({ "accessToken": "AT-restored" })),
            _ => scenario(path, req),
        }));
        let storage = Arc::new(MemoryStorage::new().with_entry(REFRESH_TOKEN_KEY, "RT-saved"));

        let auth = AgentAuth::builder(Arc::new(StaticSigner::default()))
            .config(config())
            .transport(Arc::clone(&transport) as Arc<dyn Transport>)
            .storage(storage)
            .connect()
            .await
            .unwrap();

        assert_eq!(auth.tokens().state(), TokenState::HasRefreshOnly);
        assert_eq!(auth.tokens().ensure_access_token().await.unwrap(), "AT-restored");
        assert_eq!(transport.calls("/auth/challenge"), 0);
    }

    #[tokio::test]
    async fn broken_storage_does_not_block_authentication() {
        let transport = Arc::new(MockTransport::new(scenario));
        let auth = AgentAuth::builder(Arc::new(StaticSigner::default()))
            .config(config())
            .transport(Arc::clone(&transport) as Arc<dyn Transport>)
            .storage(Arc::new(BrokenStorage))
            .connect()
            .await
            .unwrap();

        assert_eq!(auth.tokens().state(), TokenState::Unauthenticated);
        assert_eq!(auth.tokens().ensure_access_token().await.unwrap(), "AT1");
    }

    #[tokio::test]
    async fn clones_share_credentials() {
        let transport = Arc::new(MockTransport::new(scenario));
        let auth = AgentAuth::builder(Arc::new(StaticSigner::default()))
            .config(config())
            .transport(Arc::clone(&transport) as Arc<dyn Transport>)
            .connect()
            .await
            .unwrap();
        let other = auth.clone();

        auth.tokens().ensure_access_token().await.unwrap();
        assert_eq!(other.tokens().state(), TokenState::Authenticated);
        assert_eq!(transport.calls("/auth/challenge"), 1);
    }
}
