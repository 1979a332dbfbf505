//! In-process test doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use keyward_api::Challenge;
use serde_json::{json, Value};

use crate::error::SignerError;
use crate::manager::TokenManager;
use crate::storage::memory::MemoryStorage;
use crate::storage::Storage;
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::{RuntimeConfig, Signer};

pub const BASE: &str = "https://api.example.com";

type Handler = dyn Fn(&str, &HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync;

/// A [`Transport`] that answers from a closure keyed on the request path and
/// records every request it sees.
pub struct MockTransport {
    handler: Box<Handler>,
    delay: Option<Duration>,
    log: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new(
        handler: impl Fn(&str, &HttpRequest) -> Result<HttpResponse, TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            delay: None,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering every request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self, path: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| path_of(&r.url) == path)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| path_of(&r.url) == path)
            .cloned()
            .collect()
    }
}

fn path_of(url: &str) -> &str {
    url.strip_prefix(BASE).unwrap_or(url)
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.log.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(path_of(&request.url), &request)
    }
}

pub fn ok(body: Value) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse::new(200, body))
}

pub fn status(code: u16) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse::new(code, json!({ "error": "rejected" })))
}

/// The identity service from the reference scenario: challenge `ch1`,
/// exchange accepts signature `sig` and issues `AT1`/`RT1`, and every
/// refresh is rejected.
pub fn scenario(path: &str, req: &HttpRequest) -> Result<HttpResponse, TransportError> {
    match path {
        "/auth/challenge" => ok(json!({ "id": "ch1", "payload": "p" })),
        "/auth/exchange" => {
            if req.body == Some(json!({ "challengeId": "ch1", "signature": "sig" })) {
                ok(json!({ "accessToken": "AT1", "refreshToken": "RT1" }))
            } else {
                status(401)
            }
        }
        "/auth/refresh" => status(401),
        _ => status(404),
    }
}

/// Signs every challenge with the fixed string `"sig"`.
#[derive(Default)]
pub struct StaticSigner {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Signer for StaticSigner {
    async fn sign_challenge(&self, _challenge: &Challenge) -> Result<String, SignerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("sig".into())
    }
}

pub struct FailingSigner;

#[async_trait]
impl Signer for FailingSigner {
    async fn sign_challenge(&self, _challenge: &Challenge) -> Result<String, SignerError> {
        Err(SignerError("wallet locked".into()))
    }
}

pub fn config() -> RuntimeConfig {
    RuntimeConfig::new(BASE, "a1", "c1")
}

pub fn manager(
    transport: &Arc<MockTransport>,
    storage: Option<&Arc<MemoryStorage>>,
) -> TokenManager {
    TokenManager::new(
        config(),
        Arc::new(StaticSigner::default()),
        Arc::clone(transport) as Arc<dyn crate::Transport>,
        storage.map(|s| Arc::clone(s) as Arc<dyn Storage>),
    )
}
