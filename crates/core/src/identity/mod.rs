//! Caller identity. Only the verified email matters to the rest of the
//! crate: it drives allow-listing, admin checks, ownership filtering, and
//! preference keys.

pub mod google;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use google::GoogleIdTokenVerifier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: String,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token signing key '{0}' is unknown")]
    UnknownKey(String),

    #[error("token email is missing or unverified")]
    UnverifiedEmail,

    #[error("identity provider unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError>;
}

/// Fixed token -> identity table for tests and local development.
#[derive(Debug, Clone, Default)]
pub struct StaticVerifier {
    tokens: HashMap<String, Identity>,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: impl Into<String>, email: impl Into<String>) -> Self {
        let email = email.into();
        self.tokens.insert(
            token.into(),
            Identity {
                name: email.split('@').next().unwrap_or_default().to_string(),
                email,
                picture: String::new(),
            },
        );
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| IdentityError::InvalidToken("unknown token".into()))
    }
}
