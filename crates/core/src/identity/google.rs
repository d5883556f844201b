use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;

use super::{Identity, IdentityError, IdentityVerifier};
use crate::cache::TtlCache;
use crate::clock::Clock;

pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];
const JWKS_TTL_SECS: i64 = 60 * 60;

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    picture: String,
}

/// Verifies Google Sign-In ID tokens (RS256) against Google's published
/// signing keys. The key set is cached for an hour.
#[derive(Clone)]
pub struct GoogleIdTokenVerifier {
    http: Client,
    jwks_url: String,
    client_id: String,
    keys: TtlCache<(), Arc<JwkSet>>,
}

impl GoogleIdTokenVerifier {
    pub fn new(client_id: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            http: Client::new(),
            jwks_url: GOOGLE_JWKS_URL.to_string(),
            client_id: client_id.into(),
            keys: TtlCache::new(Duration::seconds(JWKS_TTL_SECS), clock),
        }
    }

    async fn key_set(&self) -> Result<Arc<JwkSet>, IdentityError> {
        if let Some(keys) = self.keys.get(&()).await {
            return Ok(keys);
        }
        let keys: JwkSet = self
            .http
            .get(&self.jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let keys = Arc::new(keys);
        self.keys.insert((), keys.clone()).await;
        tracing::debug!(count = keys.keys.len(), "Fetched identity provider signing keys");
        Ok(keys)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation
    }
}

#[async_trait]
impl IdentityVerifier for GoogleIdTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError> {
        let header = decode_header(token).map_err(|e| IdentityError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| IdentityError::InvalidToken("token header has no key id".into()))?;

        let keys = self.key_set().await?;
        let jwk = keys
            .find(&kid)
            .ok_or_else(|| IdentityError::UnknownKey(kid.clone()))?;
        let key = DecodingKey::from_jwk(jwk).map_err(|e| IdentityError::InvalidToken(e.to_string()))?;

        let claims = decode::<GoogleClaims>(token, &key, &self.validation())
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))?
            .claims;

        claims_to_identity(claims)
    }
}

fn claims_to_identity(claims: GoogleClaims) -> Result<Identity, IdentityError> {
    match (claims.email, claims.email_verified) {
        (Some(email), Some(true) | None) if !email.is_empty() => Ok(Identity {
            email: email.to_lowercase(),
            name: claims.name,
            picture: claims.picture,
        }),
        _ => Err(IdentityError::UnverifiedEmail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[tokio::test]
    async fn malformed_token_is_rejected_before_any_fetch() {
        let verifier = GoogleIdTokenVerifier::new("client", Arc::new(SystemClock));
        let err = verifier.verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, IdentityError::InvalidToken(_)));
    }

    #[test]
    fn unverified_email_is_rejected() {
        let claims = GoogleClaims {
            email: Some("a@example.com".into()),
            email_verified: Some(false),
            name: String::new(),
            picture: String::new(),
        };
        assert!(matches!(claims_to_identity(claims), Err(IdentityError::UnverifiedEmail)));
    }

    #[test]
    fn email_is_lowercased() {
        let claims = GoogleClaims {
            email: Some("Ana@Example.com".into()),
            email_verified: Some(true),
            name: "Ana".into(),
            picture: "https://example.com/p.png".into(),
        };
        let identity = claims_to_identity(claims).unwrap();
        assert_eq!(identity.email, "ana@example.com");
        assert_eq!(identity.name, "Ana");
    }

    #[test]
    fn validation_pins_audience_and_issuer() {
        let verifier = GoogleIdTokenVerifier::new("client-123", Arc::new(SystemClock));
        let validation = verifier.validation();
        assert_eq!(validation.algorithms, vec![Algorithm::RS256]);
        assert!(validation.aud.as_ref().unwrap().contains("client-123"));
        assert!(validation.iss.as_ref().unwrap().contains("accounts.google.com"));
    }
}
