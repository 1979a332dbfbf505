//! Token lifecycle manager — owns the access/refresh token pair.
//!
//! [`TokenManager::ensure_access_token`] is the one operation everything else
//! builds on. It resolves, in order:
//!
//! 1. a cached access token (no I/O, never waits on an exchange);
//! 2. a refresh exchange, if a refresh token is held;
//! 3. a full challenge-response authentication.
//!
//! A failed refresh is not an error: the refresh token is treated as revoked,
//! removed from memory and storage, and step 3 runs. A failed full
//! authentication is returned to the caller as [`AuthError`].
//!
//! # Concurrency
//!
//! At most one refresh or authentication round trip is in flight per
//! manager. Callers that miss the cache join the current exchange through a
//! shared [`OnceCell`] and all receive its result, success or failure. The
//! exchange leaves the slot once resolved, or once every waiting caller has
//! been cancelled, so the next miss starts a fresh one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::atomic::AtomicUsize;
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use keyward_api::{
    paths, Challenge, ChallengeRequest, ExchangeRequest, RefreshRequest, RefreshResponse,
    TokenPair,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::error::{AuthError, RefreshError};
use crate::signer::Signer;
use crate::storage::{Storage, StorageError, REFRESH_TOKEN_KEY};
use crate::transport::{HttpRequest, Transport};

/// One refresh or authentication round trip and the callers waiting on it.
#[derive(Default)]
struct Exchange {
    result: OnceCell<Result<String, AuthError>>,
    /// Changed only under the in-flight slot lock.
    waiters: AtomicUsize,
}

/// A caller registered on an [`Exchange`]. Dropping it, on completion or
/// cancellation, releases the slot once the exchange has resolved or no
/// caller is left to drive it.
struct Waiter<'a> {
    manager: &'a TokenManager,
    exchange: Arc<Exchange>,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        let mut slot = self.manager.lock_in_flight();
        let left = self.exchange.waiters.fetch_sub(1, Ordering::SeqCst) - 1;
        let current = slot
            .as_ref()
            .is_some_and(|e| Arc::ptr_eq(e, &self.exchange));
        if current && (left == 0 || self.exchange.result.initialized()) {
            *slot = None;
        }
    }
}

/// Observable state of a [`TokenManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// No tokens held.
    Unauthenticated,
    /// A refresh token (typically loaded from storage) but no access token.
    HasRefreshOnly,
    /// An access token is cached.
    Authenticated,
    /// A refresh or authentication round trip is in flight.
    Exchanging,
}

#[derive(Debug, Default)]
struct CredentialPair {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Sole owner and mutator of the agent's credential pair.
pub struct TokenManager {
    config: RuntimeConfig,
    signer: Arc<dyn Signer>,
    transport: Arc<dyn Transport>,
    storage: Option<Arc<dyn Storage>>,
    credentials: RwLock<CredentialPair>,
    in_flight: Mutex<Option<Arc<Exchange>>>,
    loaded: AtomicBool,
}

impl TokenManager {
    pub fn new(
        config: RuntimeConfig,
        signer: Arc<dyn Signer>,
        transport: Arc<dyn Transport>,
        storage: Option<Arc<dyn Storage>>,
    ) -> Self {
        Self {
            config,
            signer,
            transport,
            storage,
            credentials: RwLock::new(CredentialPair::default()),
            in_flight: Mutex::new(None),
            loaded: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Load a persisted refresh token. Storage is consulted at most once per
    /// manager; later calls just report the current state.
    pub async fn load(&self) -> Result<TokenState, StorageError> {
        if self.loaded.swap(true, Ordering::SeqCst) {
            return Ok(self.state());
        }
        let Some(storage) = &self.storage else {
            return Ok(self.state());
        };

        if let Some(token) = storage.get(REFRESH_TOKEN_KEY).await? {
            let mut creds = self.write_credentials();
            if creds.refresh_token.is_none() {
                debug!("loaded refresh token from storage");
                creds.refresh_token = Some(token);
            }
        }
        Ok(self.state())
    }

    pub fn state(&self) -> TokenState {
        if self
            .lock_in_flight()
            .as_ref()
            .is_some_and(|exchange| !exchange.result.initialized())
        {
            return TokenState::Exchanging;
        }
        let creds = self.read_credentials();
        match (&creds.access_token, &creds.refresh_token) {
            (Some(_), _) => TokenState::Authenticated,
            (None, Some(_)) => TokenState::HasRefreshOnly,
            (None, None) => TokenState::Unauthenticated,
        }
    }

    /// Return a usable bearer token, authenticating or refreshing if needed.
    pub async fn ensure_access_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.cached_access_token() {
            return Ok(token);
        }

        let waiter = {
            let mut slot = self.lock_in_flight();
            let exchange = match slot.as_ref().filter(|e| !e.result.initialized()) {
                Some(current) => Arc::clone(current),
                None => {
                    // An exchange may have finished between the cache check
                    // above and taking the slot.
                    if let Some(token) = self.cached_access_token() {
                        return Ok(token);
                    }
                    let fresh = Arc::new(Exchange::default());
                    *slot = Some(Arc::clone(&fresh));
                    fresh
                }
            };
            exchange.waiters.fetch_add(1, Ordering::SeqCst);
            Waiter {
                manager: self,
                exchange,
            }
        };

        let result = waiter
            .exchange
            .result
            .get_or_init(|| self.acquire())
            .await
            .clone();
        drop(waiter);
        result
    }

    /// Forget the cached access token. The next [`ensure_access_token`]
    /// refreshes (or re-authenticates). Useful after the service answers 401.
    ///
    /// [`ensure_access_token`]: Self::ensure_access_token
    pub fn invalidate_access_token(&self) {
        self.write_credentials().access_token = None;
    }

    /// Drop both tokens and delete the persisted refresh token.
    ///
    /// An exchange already in flight is not cancelled and will repopulate
    /// the pair when it completes.
    pub async fn sign_out(&self) -> Result<(), StorageError> {
        {
            let mut creds = self.write_credentials();
            creds.access_token = None;
            creds.refresh_token = None;
        }
        if let Some(storage) = &self.storage {
            storage.delete(REFRESH_TOKEN_KEY).await?;
        }
        info!("signed out");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Exchanges
    // -----------------------------------------------------------------------

    /// Body of the single in-flight exchange: refresh if possible, otherwise
    /// authenticate from scratch.
    async fn acquire(&self) -> Result<String, AuthError> {
        let held = self.read_credentials().refresh_token.clone();
        if let Some(refresh_token) = held {
            let url = self.config.endpoint(paths::REFRESH)?;
            match self.refresh(&url, &refresh_token).await {
                Ok(access_token) => return Ok(access_token),
                Err(e) => {
                    warn!(error = %e, "refresh failed; discarding refresh token");
                    self.discard_refresh_token(&refresh_token).await;
                }
            }
        }
        self.authenticate().await
    }

    async fn refresh(&self, url: &str, refresh_token: &str) -> Result<String, RefreshError> {
        debug!("refreshing access token");
        let request = HttpRequest::post_json(
            url,
            &RefreshRequest {
                refresh_token: refresh_token.to_string(),
            },
        )?;
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(RefreshError::Rejected(response.status));
        }
        let refreshed: RefreshResponse = response.json()?;

        {
            let mut creds = self.write_credentials();
            creds.access_token = Some(refreshed.access_token.clone());
            if let Some(rotated) = &refreshed.refresh_token {
                creds.refresh_token = Some(rotated.clone());
            }
        }
        if let Some(rotated) = &refreshed.refresh_token {
            self.persist_refresh_token(rotated).await;
        }

        info!(rotated = refreshed.refresh_token.is_some(), "access token refreshed");
        Ok(refreshed.access_token)
    }

    /// Full challenge-response authentication. Nothing is cached unless every
    /// step succeeds.
    async fn authenticate(&self) -> Result<String, AuthError> {
        let challenge_url = self.config.endpoint(paths::CHALLENGE)?;
        let exchange_url = self.config.endpoint(paths::EXCHANGE)?;

        debug!(agent_ref = %self.config.agent_ref(), "requesting challenge");
        let challenge: Challenge = self
            .post_for(
                &challenge_url,
                &ChallengeRequest {
                    agent_ref: self.config.agent_ref().to_string(),
                    credential_id: self.config.credential_id().to_string(),
                    scopes: self.config.scopes().to_vec(),
                },
            )
            .await
            .map_err(AuthError::ChallengeRequest)?;

        let signature = self
            .signer
            .sign_challenge(&challenge)
            .await
            .map_err(|e| AuthError::Signer(e.to_string()))?;

        debug!(challenge_id = %challenge.id, "exchanging signed challenge");
        let pair: TokenPair = self
            .post_for(
                &exchange_url,
                &ExchangeRequest {
                    challenge_id: challenge.id,
                    signature,
                },
            )
            .await
            .map_err(AuthError::TokenExchange)?;

        {
            let mut creds = self.write_credentials();
            creds.access_token = Some(pair.access_token.clone());
            if let Some(refresh_token) = &pair.refresh_token {
                creds.refresh_token = Some(refresh_token.clone());
            }
        }
        if let Some(refresh_token) = &pair.refresh_token {
            self.persist_refresh_token(refresh_token).await;
        }

        info!(agent_ref = %self.config.agent_ref(), "agent authenticated");
        Ok(pair.access_token)
    }

    /// POST `body` and decode a 2xx response. Failures are flattened to a
    /// message for the caller to wrap in the right [`AuthError`] variant.
    async fn post_for<B, T>(&self, url: &str, body: &B) -> Result<T, String>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let request = HttpRequest::post_json(url, body).map_err(|e| e.to_string())?;
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| e.to_string())?;
        if !response.is_success() {
            return Err(format!(
                "identity service returned {} {}",
                response.status,
                response.failure_reason()
            ));
        }
        response.json().map_err(|e| e.to_string())
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    async fn persist_refresh_token(&self, token: &str) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.set(REFRESH_TOKEN_KEY, token).await {
                warn!(error = %e, "failed to persist refresh token");
            }
        }
    }

    async fn discard_refresh_token(&self, token: &str) {
        {
            let mut creds = self.write_credentials();
            if creds.refresh_token.as_deref() == Some(token) {
                creds.refresh_token = None;
            }
        }
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.delete(REFRESH_TOKEN_KEY).await {
                warn!(error = %e, "failed to delete revoked refresh token");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Locking helpers
    // -----------------------------------------------------------------------

    fn cached_access_token(&self) -> Option<String> {
        self.read_credentials().access_token.clone()
    }

    fn read_credentials(&self) -> RwLockReadGuard<'_, CredentialPair> {
        self.credentials.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_credentials(&self) -> RwLockWriteGuard<'_, CredentialPair> {
        self.credentials.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<Arc<Exchange>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
