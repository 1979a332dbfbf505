//! Runtime configuration, built in code or populated from environment variables.

use std::time::Duration;

use crate::error::AuthError;

/// Immutable configuration for a [`TokenManager`](crate::TokenManager).
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `KEYWARD_BASE_URL` | (absent) | Identity service base URL |
/// | `KEYWARD_AGENT_REF` | empty | Agent the credential is issued for |
/// | `KEYWARD_CREDENTIAL_ID` | empty | Wallet credential that signs challenges |
/// | `KEYWARD_SCOPES` | (none) | Comma-separated scopes to request |
/// | `KEYWARD_REFRESH_LEAD_SECS` | (absent) | Advisory refresh lead time |
///
/// A missing base URL is not rejected at construction: it surfaces as
/// [`AuthError::Configuration`] on the first operation that needs the
/// network, so a runtime holding a cached token keeps working.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeConfig {
    base_url: Option<String>,
    agent_ref: String,
    credential_id: String,
    scopes: Vec<String>,
    refresh_lead_time: Option<Duration>,
}

impl RuntimeConfig {
    pub fn new(
        base_url: impl Into<String>,
        agent_ref: impl Into<String>,
        credential_id: impl Into<String>,
    ) -> Self {
        Self::default()
            .with_base_url(base_url)
            .with_agent_ref(agent_ref)
            .with_credential_id(credential_id)
    }

    /// Populate config from environment variables, applying defaults where absent.
    ///
    /// Unparseable values are ignored rather than rejected.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = var("KEYWARD_BASE_URL") {
            config = config.with_base_url(url);
        }
        config.agent_ref = var("KEYWARD_AGENT_REF").unwrap_or_default();
        config.credential_id = var("KEYWARD_CREDENTIAL_ID").unwrap_or_default();
        config.scopes = var("KEYWARD_SCOPES")
            .map(|v| parse_scopes(&v))
            .unwrap_or_default();
        config.refresh_lead_time = var("KEYWARD_REFRESH_LEAD_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        config
    }

    /// Set the base URL. Trailing slashes are dropped; a blank value leaves
    /// the base URL unset.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let url = base_url.into();
        let trimmed = url.trim().trim_end_matches('/');
        self.base_url = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_agent_ref(mut self, agent_ref: impl Into<String>) -> Self {
        self.agent_ref = agent_ref.into();
        self
    }

    pub fn with_credential_id(mut self, credential_id: impl Into<String>) -> Self {
        self.credential_id = credential_id.into();
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// How long before expiry a refresh should be attempted. Recorded but
    /// not acted on: access tokens are opaque to the runtime.
    pub fn with_refresh_lead_time(mut self, lead: Duration) -> Self {
        self.refresh_lead_time = Some(lead);
        self
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn agent_ref(&self) -> &str {
        &self.agent_ref
    }

    pub fn credential_id(&self) -> &str {
        &self.credential_id
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn refresh_lead_time(&self) -> Option<Duration> {
        self.refresh_lead_time
    }

    /// Join `path` onto the base URL, or fail with a configuration error.
    pub(crate) fn endpoint(&self, path: &str) -> Result<String, AuthError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| AuthError::Configuration("base URL is not configured".into()))?;
        Ok(format!("{base}{path}"))
    }
}

fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
