//! Bearer token verification
//!
//! Listing and interest logic only ever sees an [`Identity`]; which provider
//! produced it is decided once at startup.

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// A verified caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl Identity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            uid: None,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token")]
    InvalidToken,

    #[error("token has no verified email")]
    MissingEmail,

    #[error("verification provider unavailable: {0}")]
    Provider(String),
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Fixed token table for local development and tests
#[derive(Debug, Clone, Default)]
pub struct StaticAuthProvider {
    tokens: HashMap<String, Identity>,
}

impl StaticAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, email: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), Identity::new(email));
        self
    }

    /// Parse `token:email,token2:email2`
    pub fn parse(tokens: &str) -> Result<Self, String> {
        let mut provider = Self::new();
        for entry in tokens.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (token, email) = entry
                .split_once(':')
                .ok_or_else(|| format!("expected token:email, got '{}'", entry))?;
            let (token, email) = (token.trim(), email.trim());
            if token.is_empty() || email.is_empty() {
                return Err(format!("empty token or email in '{}'", entry));
            }
            provider = provider.with_token(token, email);
        }
        Ok(provider)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        self.tokens.get(token).cloned().ok_or(AuthError::InvalidToken)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
}

/// Verifies Firebase ID tokens via the Identity Toolkit `accounts:lookup` call
#[derive(Clone)]
pub struct FirebaseAuthProvider {
    client: Client,
    api_key: String,
    base_url: String,
    cache: Arc<Cache<String, Identity>>,
}

impl FirebaseAuthProvider {
    pub fn new(api_key: String, cache_ttl: Duration) -> Self {
        Self::with_base_url(api_key, IDENTITY_TOOLKIT_URL.to_string(), cache_ttl)
    }

    pub fn with_base_url(api_key: String, base_url: String, cache_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(cache_ttl)
            .build();

        Self {
            client: Client::new(),
            api_key,
            base_url,
            cache: Arc::new(cache),
        }
    }
}

/// Rate limiting is the provider's failure; other 4xx answers reject the token
fn check_lookup_status(status: StatusCode) -> Result<(), AuthError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!(status = %status, "Identity provider is rate limiting lookups");
        return Err(AuthError::Provider(format!("identity provider returned {}", status)));
    }
    if status.is_client_error() {
        tracing::debug!(status = %status, "Token rejected by identity provider");
        return Err(AuthError::InvalidToken);
    }
    if !status.is_success() {
        return Err(AuthError::Provider(format!("identity provider returned {}", status)));
    }
    Ok(())
}

#[async_trait]
impl AuthProvider for FirebaseAuthProvider {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        if let Some(identity) = self.cache.get(token).await {
            tracing::debug!(email = %identity.email, "Token cache hit");
            return Ok(identity);
        }

        let url = format!("{}/accounts:lookup", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&LookupRequest { id_token: token })
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        check_lookup_status(response.status())?;

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;
        let user = body.users.into_iter().next().ok_or(AuthError::InvalidToken)?;
        let email = user.email.ok_or(AuthError::MissingEmail)?;

        let identity = Identity {
            email,
            name: user.display_name,
            uid: user.local_id,
        };
        self.cache.insert(token.to_string(), identity.clone()).await;
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_status_classification() {
        assert!(check_lookup_status(StatusCode::OK).is_ok());
        assert!(matches!(
            check_lookup_status(StatusCode::BAD_REQUEST),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            check_lookup_status(StatusCode::TOO_MANY_REQUESTS),
            Err(AuthError::Provider(_))
        ));
        assert!(matches!(
            check_lookup_status(StatusCode::SERVICE_UNAVAILABLE),
            Err(AuthError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn test_static_provider_verifies_known_tokens() {
        let provider =
            StaticAuthProvider::parse("tok-a:a@example.com, tok-b:b@example.com").unwrap();
        assert_eq!(provider.len(), 2);

        let identity = provider.verify("tok-b").await.unwrap();
        assert_eq!(identity.email, "b@example.com");
        assert!(matches!(
            provider.verify("nope").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_static_provider_parse_errors() {
        assert!(StaticAuthProvider::parse("no-separator").is_err());
        assert!(StaticAuthProvider::parse("tok:").is_err());
        assert!(StaticAuthProvider::parse("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_firebase_provider_reports_unreachable_backend() {
        let provider = FirebaseAuthProvider::with_base_url(
            "key".to_string(),
            "http://127.0.0.1:9".to_string(),
            Duration::from_secs(60),
        );
        assert!(matches!(
            provider.verify("token").await,
            Err(AuthError::Provider(_))
        ));
    }
}
