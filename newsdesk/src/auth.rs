use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How the session identity was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityKind {
    Anonymous,
    CustomToken,
    /// Generated locally because the identity service was unavailable
    Local,
}

/// The single identity a session runs under. Never rotated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub kind: IdentityKind,
    pub id_token: Option<String>,
}

impl Identity {
    /// Random identity used in degraded mode.
    pub fn local() -> Self {
        Self {
            user_id: format!("local-{}", uuid::Uuid::new_v4()),
            kind: IdentityKind::Local,
            id_token: None,
        }
    }

    pub fn is_local(&self) -> bool {
        self.kind == IdentityKind::Local
    }
}

/// Sign-in against an identity service.
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self) -> Result<Identity>;
}

/// Identity-toolkit style REST client: anonymous sign-up or custom-token sign-in.
pub struct RemoteAuthProvider {
    base_url: String,
    api_key: Option<String>,
    custom_token: Option<String>,
    client: reqwest::Client,
    timeout: Duration,
}

impl RemoteAuthProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            custom_token: None,
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_custom_token(mut self, token: Option<String>) -> Self {
        self.custom_token = token;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_secs);
        self
    }

    fn endpoint(&self, method: &str) -> Result<url::Url> {
        let raw = format!("{}/accounts:{}", self.base_url.trim_end_matches('/'), method);
        let mut url = url::Url::parse(&raw).with_context(|| format!("invalid auth endpoint: {}", raw))?;
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }
}

#[async_trait::async_trait]
impl AuthProvider for RemoteAuthProvider {
    async fn sign_in(&self) -> Result<Identity> {
        let (url, body, kind) = match &self.custom_token {
            Some(token) => (
                self.endpoint("signInWithCustomToken")?,
                SignInRequest {
                    token: Some(token.clone()),
                    return_secure_token: true,
                },
                IdentityKind::CustomToken,
            ),
            None => (
                self.endpoint("signUp")?,
                SignInRequest {
                    token: None,
                    return_secure_token: true,
                },
                IdentityKind::Anonymous,
            ),
        };

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("identity request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("identity service error {}: {}", status, body);
        }

        let payload: SignInResponse = response
            .json()
            .await
            .context("Failed to parse identity response")?;

        if payload.local_id.trim().is_empty() {
            anyhow::bail!("identity service returned an empty user id");
        }

        Ok(Identity {
            user_id: payload.local_id,
            kind,
            id_token: payload.id_token,
        })
    }
}

/// Resolves the session identity once at startup.
pub struct SessionBootstrap {
    provider: Option<Arc<dyn AuthProvider>>,
}

impl SessionBootstrap {
    pub fn new(provider: Option<Arc<dyn AuthProvider>>) -> Self {
        Self { provider }
    }

    /// Bootstrap that skips the identity service entirely.
    pub fn offline() -> Self {
        Self { provider: None }
    }

    /// Sign in, or fall back to a locally generated identity.
    pub async fn resolve_identity(&self) -> Identity {
        let Some(provider) = &self.provider else {
            let identity = Identity::local();
            info!(user_id = %identity.user_id, "no identity service configured, using local identity");
            return identity;
        };

        match provider.sign_in().await {
            Ok(identity) => {
                info!(user_id = %identity.user_id, kind = ?identity.kind, "signed in");
                identity
            }
            Err(e) => {
                let identity = Identity::local();
                warn!(error = %e, user_id = %identity.user_id, "sign-in failed, continuing with local identity");
                identity
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    id_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_identities_are_unique() {
        let a = Identity::local();
        let b = Identity::local();
        assert!(a.is_local());
        assert_ne!(a.user_id, b.user_id);
    }

    #[test]
    fn endpoint_carries_api_key() {
        let provider = RemoteAuthProvider::new("https://auth.example.com/v1/")
            .with_api_key(Some("k123".into()));
        let url = provider.endpoint("signUp").unwrap();
        assert_eq!(url.as_str(), "https://auth.example.com/v1/accounts:signUp?key=k123");
    }

    #[tokio::test]
    async fn offline_bootstrap_synthesizes_identity() {
        let identity = SessionBootstrap::offline().resolve_identity().await;
        assert_eq!(identity.kind, IdentityKind::Local);
        assert!(identity.user_id.starts_with("local-"));
    }
}
