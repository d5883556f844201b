//! Bearer tokens for Google REST APIs, shared by the object store and the
//! message queue.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// How requests are authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessToken {
    /// No `Authorization` header (public buckets, local emulators).
    Anonymous,
    /// Fixed bearer token.
    Static(String),
    /// Service-account token from the GCE metadata server, refreshed on expiry.
    MetadataServer,
}

impl AccessToken {
    /// A configured token if there is one, the metadata server otherwise.
    pub fn from_config(token: Option<String>) -> Self {
        match token {
            Some(token) if !token.trim().is_empty() => AccessToken::Static(token),
            _ => AccessToken::MetadataServer,
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("metadata server unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("metadata server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: i64,
}

/// Resolves the bearer token for outgoing requests. Clones share one
/// cached metadata token.
#[derive(Clone)]
pub struct TokenProvider {
    http: Client,
    source: AccessToken,
    metadata_url: String,
    cached: Arc<RwLock<Option<(String, DateTime<Utc>)>>>,
}

impl TokenProvider {
    pub fn new(source: AccessToken) -> Self {
        Self {
            http: Client::new(),
            source,
            metadata_url: METADATA_TOKEN_URL.to_string(),
            cached: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into();
        self
    }

    pub fn source(&self) -> &AccessToken {
        &self.source
    }

    /// The bearer token to send, or `None` for anonymous access.
    pub async fn token(&self) -> Result<Option<String>, TokenError> {
        match &self.source {
            AccessToken::Anonymous => Ok(None),
            AccessToken::Static(token) => Ok(Some(token.clone())),
            AccessToken::MetadataServer => self.metadata_token().await.map(Some),
        }
    }

    pub async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, TokenError> {
        Ok(match self.token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn metadata_token(&self) -> Result<String, TokenError> {
        let now = Utc::now();
        if let Some((token, expires_at)) = self.cached.read().await.as_ref() {
            if *expires_at > now {
                return Ok(token.clone());
            }
        }

        let response = self
            .http
            .get(&self.metadata_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let token: MetadataToken = response.json().await?;

        // Refresh a minute early so in-flight requests never carry a stale token.
        let expires_at = now + Duration::seconds(token.expires_in - 60);
        *self.cached.write().await = Some((token.access_token.clone(), expires_at));
        tracing::debug!("Refreshed access token from metadata server");
        Ok(token.access_token)
    }
}
