//! Request authentication: Google ID tokens for dashboard users, plus a
//! shared API key for the article feed.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use newsroom_core::identity::Identity;
use newsroom_core::ownership::Caller;

use crate::error::ApiError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// A verified, allow-listed dashboard user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: Identity,
    pub is_admin: bool,
}

impl AuthUser {
    pub fn email(&self) -> &str {
        &self.identity.email
    }

    pub fn caller(&self) -> Caller {
        Caller {
            email: self.identity.email.clone(),
            is_admin: self.is_admin,
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn authenticate(token: &str, state: &AppState) -> Result<AuthUser, ApiError> {
    let identity = state.verifier().verify(token).await.map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        ApiError::from(e)
    })?;

    let sets = state.access().sets().await;
    if !sets.is_allowed(&identity.email) {
        tracing::warn!(email = identity.email.as_str(), "Signed-in user is not on the allowlist");
        return Err(ApiError::Forbidden(format!("{} is not allowed to use this service", identity.email)));
    }
    let is_admin = sets.is_admin(&identity.email);
    Ok(AuthUser { identity, is_admin })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
        authenticate(token, state).await
    }
}

/// Access to the article feed: either a signed-in user or a holder of the
/// shared API key. Only the former carries an identity.
#[derive(Debug, Clone)]
pub enum FeedAccess {
    User(AuthUser),
    ApiKey,
}

impl FeedAccess {
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            FeedAccess::User(user) => Some(user),
            FeedAccess::ApiKey => None,
        }
    }
}

impl FromRequestParts<AppState> for FeedAccess {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(token) = bearer_token(parts) {
            return authenticate(token, state).await.map(FeedAccess::User);
        }

        let presented = parts.headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
        match (state.config().api_key.as_deref(), presented) {
            (Some(expected), Some(presented)) if expected == presented => Ok(FeedAccess::ApiKey),
            (Some(_), Some(_)) => Err(ApiError::Unauthorized("invalid API key".to_string())),
            _ => Err(ApiError::Unauthorized(
                "an API key or bearer token is required".to_string(),
            )),
        }
    }
}
