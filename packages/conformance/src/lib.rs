//! Shared helpers for the Keyward conformance test suite.
//!
//! [`spawn_identity_service`] binds a `TcpListener` on an ephemeral port and
//! serves a small but honest identity service: challenges
//! are single use, signatures are verified against the agent's registered
//! Ed25519 key, and refresh tokens can be revoked or rotated. The returned
//! [`IdentityService`] handle lets tests register agents and flip behaviour
//! without going through HTTP.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use keyward_api::error::codes;
use keyward_api::{
    paths, AgentList, AgentProfile, Challenge, ChallengeRequest, ErrorResponse, ExchangeRequest,
    RefreshRequest, RefreshResponse, SignMessageRequest, SignatureResponse, TokenPair, TypedData,
};
use keyward_runtime::{Signer, SignerError};
use rand::rngs::OsRng;

// ---------------------------------------------------------------------------
// Agent-side signer
// ---------------------------------------------------------------------------

/// An Ed25519 [`Signer`] for tests: signs the challenge payload, base58
/// encodes the signature.
pub struct TestSigner {
    key: SigningKey,
}

impl TestSigner {
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

#[async_trait]
impl Signer for TestSigner {
    async fn sign_challenge(&self, challenge: &Challenge) -> Result<String, SignerError> {
        let signature = self.key.sign(challenge.payload.as_bytes());
        Ok(bs58::encode(signature.to_bytes()).into_string())
    }
}

// ---------------------------------------------------------------------------
// Service state
// ---------------------------------------------------------------------------

struct RegisteredAgent {
    profile: AgentProfile,
    credential_id: String,
    key: VerifyingKey,
}

struct PendingChallenge {
    agent_ref: String,
    payload: String,
}

#[derive(Default)]
struct Tables {
    agents: HashMap<String, RegisteredAgent>,
    challenges: HashMap<String, PendingChallenge>,
    access_tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
}

/// Handle to a running mock identity service.
pub struct IdentityService {
    tables: Mutex<Tables>,
    wallet: SigningKey,
    challenge_delay: Mutex<Duration>,
    rotate_refresh_tokens: AtomicBool,
    challenge_requests: AtomicUsize,
    exchange_requests: AtomicUsize,
    refresh_requests: AtomicUsize,
}

impl IdentityService {
    fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            wallet: SigningKey::generate(&mut OsRng),
            challenge_delay: Mutex::new(Duration::ZERO),
            rotate_refresh_tokens: AtomicBool::new(false),
            challenge_requests: AtomicUsize::new(0),
            exchange_requests: AtomicUsize::new(0),
            refresh_requests: AtomicUsize::new(0),
        }
    }

    /// Register an agent whose challenges must be signed by `key`.
    pub fn register_agent(
        &self,
        agent_ref: &str,
        credential_id: &str,
        name: &str,
        key: VerifyingKey,
    ) {
        let profile = AgentProfile {
            id: agent_ref.to_string(),
            name: Some(name.to_string()),
            wallet_address: None,
            extra: Default::default(),
        };
        self.tables.lock().unwrap().agents.insert(
            agent_ref.to_string(),
            RegisteredAgent {
                profile,
                credential_id: credential_id.to_string(),
                key,
            },
        );
    }

    /// Key the service wallet signs messages and typed data with.
    pub fn wallet_key(&self) -> VerifyingKey {
        self.wallet.verifying_key()
    }

    /// Hold every challenge response for `delay`.
    pub fn set_challenge_delay(&self, delay: Duration) {
        *self.challenge_delay.lock().unwrap() = delay;
    }

    /// Issue a new refresh token on every refresh.
    pub fn set_rotate_refresh_tokens(&self, rotate: bool) {
        self.rotate_refresh_tokens.store(rotate, Ordering::SeqCst);
    }

    /// Invalidate every access token issued so far.
    pub fn revoke_access_tokens(&self) {
        self.tables.lock().unwrap().access_tokens.clear();
    }

    /// Invalidate every refresh token issued so far.
    pub fn revoke_refresh_tokens(&self) {
        self.tables.lock().unwrap().refresh_tokens.clear();
    }

    pub fn challenge_requests(&self) -> usize {
        self.challenge_requests.load(Ordering::SeqCst)
    }

    pub fn exchange_requests(&self) -> usize {
        self.exchange_requests.load(Ordering::SeqCst)
    }

    pub fn refresh_requests(&self) -> usize {
        self.refresh_requests.load(Ordering::SeqCst)
    }

    fn issue_access_token(tables: &mut Tables, agent_ref: &str) -> String {
        let token = format!("at-{}", uuid::Uuid::now_v7());
        tables.access_tokens.insert(token.clone(), agent_ref.to_string());
        token
    }

    fn issue_refresh_token(tables: &mut Tables, agent_ref: &str) -> String {
        let token = format!("rt-{}", uuid::Uuid::new_v4());
        tables.refresh_tokens.insert(token.clone(), agent_ref.to_string());
        token
    }

    fn sign_with_wallet(&self, bytes: &[u8]) -> String {
        bs58::encode(self.wallet.sign(bytes).to_bytes()).into_string()
    }
}

// ---------------------------------------------------------------------------
// Error responses
// ---------------------------------------------------------------------------

struct ServiceError(StatusCode, &'static str, String);

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let ServiceError(status, code, message) = self;
        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

type Shared = Arc<IdentityService>;

fn agent_removed() -> ServiceError {
    ServiceError(StatusCode::NOT_FOUND, codes::NOT_FOUND, "agent removed".into())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn challenge(
    State(svc): State<Shared>,
    Json(req): Json<ChallengeRequest>,
) -> Result<Json<Challenge>, ServiceError> {
    svc.challenge_requests.fetch_add(1, Ordering::SeqCst);
    let delay = *svc.challenge_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut tables = svc.tables.lock().unwrap();
    match tables.agents.get(&req.agent_ref) {
        Some(agent) if agent.credential_id == req.credential_id => {}
        Some(_) => {
            return Err(ServiceError(
                StatusCode::BAD_REQUEST,
                codes::INVALID_REQUEST,
                "credential does not belong to agent".into(),
            ))
        }
        None => {
            return Err(ServiceError(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                format!("unknown agent {}", req.agent_ref),
            ))
        }
    }

    let id = uuid::Uuid::now_v7().to_string();
    let payload = format!("keyward-challenge:{id}:{}", uuid::Uuid::new_v4());
    tables.challenges.insert(
        id.clone(),
        PendingChallenge {
            agent_ref: req.agent_ref,
            payload: payload.clone(),
        },
    );
    Ok(Json(Challenge { id, payload }))
}

async fn exchange(
    State(svc): State<Shared>,
    Json(req): Json<ExchangeRequest>,
) -> Result<Json<TokenPair>, ServiceError> {
    svc.exchange_requests.fetch_add(1, Ordering::SeqCst);
    let mut tables = svc.tables.lock().unwrap();

    // Single use: the challenge is consumed whether or not the signature holds.
    let pending = tables.challenges.remove(&req.challenge_id).ok_or_else(|| {
        ServiceError(
            StatusCode::BAD_REQUEST,
            codes::INVALID_CHALLENGE,
            "unknown or already used challenge".into(),
        )
    })?;
    let key = tables
        .agents
        .get(&pending.agent_ref)
        .map(|a| a.key)
        .ok_or_else(agent_removed)?;

    let invalid = || {
        ServiceError(
            StatusCode::UNAUTHORIZED,
            codes::INVALID_SIGNATURE,
            "signature does not verify".into(),
        )
    };
    let bytes: [u8; 64] = bs58::decode(&req.signature)
        .into_vec()
        .ok()
        .and_then(|v| v.try_into().ok())
        .ok_or_else(invalid)?;
    key.verify(pending.payload.as_bytes(), &Signature::from_bytes(&bytes))
        .map_err(|_| invalid())?;

    let access_token = IdentityService::issue_access_token(&mut tables, &pending.agent_ref);
    let refresh_token = IdentityService::issue_refresh_token(&mut tables, &pending.agent_ref);
    Ok(Json(TokenPair {
        access_token,
        refresh_token: Some(refresh_token),
    }))
}

async fn refresh(
    State(svc): State<Shared>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ServiceError> {
    svc.refresh_requests.fetch_add(1, Ordering::SeqCst);
    let rotate = svc.rotate_refresh_tokens.load(Ordering::SeqCst);
    let mut tables = svc.tables.lock().unwrap();

    let agent_ref = tables
        .refresh_tokens
        .get(&req.refresh_token)
        .cloned()
        .ok_or_else(|| {
            ServiceError(
                StatusCode::UNAUTHORIZED,
                codes::INVALID_GRANT,
                "refresh token revoked".into(),
            )
        })?;

    let access_token = IdentityService::issue_access_token(&mut tables, &agent_ref);
    let refresh_token = rotate.then(|| {
        tables.refresh_tokens.remove(&req.refresh_token);
        IdentityService::issue_refresh_token(&mut tables, &agent_ref)
    });
    Ok(Json(RefreshResponse {
        access_token,
        refresh_token,
    }))
}

/// Resolve the bearer token to an agent reference.
fn authorised(svc: &IdentityService, headers: &HeaderMap) -> Result<String, ServiceError> {
    let unauthorised = || {
        ServiceError(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "missing or invalid access token".into(),
        )
    };
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(unauthorised)?;
    svc.tables
        .lock()
        .unwrap()
        .access_tokens
        .get(token)
        .cloned()
        .ok_or_else(unauthorised)
}

async fn agent_me(
    State(svc): State<Shared>,
    headers: HeaderMap,
) -> Result<Json<AgentProfile>, ServiceError> {
    let agent_ref = authorised(&svc, &headers)?;
    let tables = svc.tables.lock().unwrap();
    tables
        .agents
        .get(&agent_ref)
        .map(|a| Json(a.profile.clone()))
        .ok_or_else(agent_removed)
}

async fn agents(
    State(svc): State<Shared>,
    headers: HeaderMap,
) -> Result<Json<AgentList>, ServiceError> {
    authorised(&svc, &headers)?;
    let tables = svc.tables.lock().unwrap();
    let mut agents: Vec<AgentProfile> = tables.agents.values().map(|a| a.profile.clone()).collect();
    agents.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(Json(AgentList { agents }))
}

async fn sign_message(
    State(svc): State<Shared>,
    headers: HeaderMap,
    Json(req): Json<SignMessageRequest>,
) -> Result<Json<SignatureResponse>, ServiceError> {
    authorised(&svc, &headers)?;
    Ok(Json(SignatureResponse {
        signature: svc.sign_with_wallet(req.message.as_bytes()),
    }))
}

async fn sign_typed_data(
    State(svc): State<Shared>,
    headers: HeaderMap,
    Json(data): Json<TypedData>,
) -> Result<Json<SignatureResponse>, ServiceError> {
    authorised(&svc, &headers)?;
    let canonical = serde_json::to_vec(&data).map_err(|e| {
        ServiceError(StatusCode::BAD_REQUEST, codes::INVALID_REQUEST, e.to_string())
    })?;
    Ok(Json(SignatureResponse {
        signature: svc.sign_with_wallet(&canonical),
    }))
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

fn build_router(svc: Shared) -> Router {
    Router::new()
        .route(paths::CHALLENGE, post(challenge))
        .route(paths::EXCHANGE, post(exchange))
        .route(paths::REFRESH, post(refresh))
        .route(paths::AGENT_ME, get(agent_me))
        .route(paths::AGENTS, get(agents))
        .route(paths::SIGN_MESSAGE, post(sign_message))
        .route(paths::SIGN_TYPED_DATA, post(sign_typed_data))
        .with_state(svc)
}

/// Start an ephemeral in-process identity service and return `(base_url, service)`.
///
/// The service runs in a background `tokio` task bound to an OS-assigned
/// port on `127.0.0.1`, e.g. `http://127.0.0.1:51234`.
///
/// # Panics
///
/// Panics if the TCP listener cannot be bound.
pub async fn spawn_identity_service() -> (String, Arc<IdentityService>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("get local addr");
    let base_url = format!("http://{addr}");

    let svc = Arc::new(IdentityService::new());
    let router = build_router(Arc::clone(&svc));

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("identity service error");
    });

    (base_url, svc)
}
