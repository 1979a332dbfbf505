//! Signed API client — authorised calls to the identity service.
//!
//! Every operation follows one template: obtain a token from the
//! [`TokenManager`], send the request with `Authorization: Bearer <token>`,
//! and turn a non-2xx answer into [`ClientError::Api`]. The client only reads
//! tokens; it never refreshes or clears them itself, and a 401 is returned to
//! the caller rather than retried. A caller that wants a retry can call
//! [`TokenManager::invalidate_access_token`] and try again.

use std::sync::Arc;

use keyward_api::{
    paths, AgentList, AgentProfile, SignMessageRequest, SignatureResponse, TypedData,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::ClientError;
use crate::manager::TokenManager;
use crate::transport::{HttpRequest, Method, Transport};

pub struct ApiClient {
    tokens: Arc<TokenManager>,
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(tokens: Arc<TokenManager>, transport: Arc<dyn Transport>) -> Self {
        Self { tokens, transport }
    }

    /// `GET /agents/me` — the profile of the authenticated agent.
    pub async fn get_agent(&self) -> Result<AgentProfile, ClientError> {
        self.call(Method::Get, paths::AGENT_ME, None).await
    }

    /// `GET /agents` — agents visible to the authenticated agent.
    pub async fn list_agents(&self) -> Result<Vec<AgentProfile>, ClientError> {
        let list: AgentList = self.call(Method::Get, paths::AGENTS, None).await?;
        Ok(list.agents)
    }

    /// `POST /wallet/sign-typed-data`
    pub async fn sign_typed_data(
        &self,
        data: &TypedData,
    ) -> Result<SignatureResponse, ClientError> {
        let body = encode(data)?;
        self.call(Method::Post, paths::SIGN_TYPED_DATA, Some(body)).await
    }

    /// `POST /wallet/sign-message`
    pub async fn sign_message(&self, message: &str) -> Result<SignatureResponse, ClientError> {
        let body = encode(&SignMessageRequest {
            message: message.to_string(),
        })?;
        self.call(Method::Post, paths::SIGN_MESSAGE, Some(body)).await
    }

    /// Authorised request to any JSON endpoint, relative to the base URL.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        self.call(method, path, body).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let token = self.tokens.ensure_access_token().await?;
        let url = self.tokens.config().endpoint(path)?;

        let mut request = match method {
            Method::Get => HttpRequest::get(url),
            Method::Post => HttpRequest::post(url, body.unwrap_or(Value::Null)),
        };
        request = request.bearer(&token);

        debug!(method = method.as_str(), path, "calling identity service");
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(ClientError::Api {
                status: response.status,
                reason: response.failure_reason(),
            });
        }
        Ok(response.json()?)
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, ClientError> {
    serde_json::to_value(value).map_err(|e| ClientError::Decode(e.to_string()))
}
