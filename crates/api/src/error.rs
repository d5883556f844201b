use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use newsroom_core::identity::IdentityError;
use newsroom_core::ownership::OwnershipError;
use newsroom_core::preferences::PreferencesError;
use newsroom_core::trigger::TriggerError;
use newsroom_core::ReconcileError;
use serde_json::json;

/// API error type, rendered as `{"error": {"type", "message", "statusCode"}}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "notFound", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "badRequest", msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            ApiError::Upstream(msg) => {
                tracing::error!("Upstream error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "upstreamError",
                    "An upstream service failed".to_string(),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internalError",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": {
                "type": error_type,
                "message": message,
                "statusCode": status.as_u16(),
            }
        });

        (status, Json(body)).into_response()
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::BadRegion(_) | ReconcileError::InvalidDateRange(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ReconcileError::Unauthorized(OwnershipError::Unauthenticated) => {
                ApiError::Unauthorized(err.to_string())
            }
            ReconcileError::Unauthorized(OwnershipError::Forbidden(_)) => ApiError::Forbidden(err.to_string()),
            ReconcileError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ReconcileError::Upstream { .. } => ApiError::Upstream(err.to_string()),
        }
    }
}

impl From<TriggerError> for ApiError {
    fn from(err: TriggerError) -> Self {
        match err {
            TriggerError::Validation(msg) => ApiError::BadRequest(msg),
            TriggerError::Queue(e) => ApiError::Upstream(e.to_string()),
            TriggerError::Encode(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<PreferencesError> for ApiError {
    fn from(err: PreferencesError) -> Self {
        match err {
            PreferencesError::Store(e) => ApiError::Upstream(e.to_string()),
            PreferencesError::Encode(e) => ApiError::Internal(e.to_string()),
            PreferencesError::InvalidRegion(e) => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Unreachable(e) => ApiError::Upstream(format!("identity provider: {e}")),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

/// Convenience type alias for route handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use newsroom_core::source::{DateRangeError, UnknownRegion};

    fn status(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn reconcile_errors_map_to_statuses() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(status(ReconcileError::BadRegion(UnknownRegion("us".into()))), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(ReconcileError::InvalidDateRange(DateRangeError::HalfOpenRange)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(ReconcileError::Unauthorized(OwnershipError::Forbidden("b@x.com".into()))),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(ReconcileError::Unauthorized(OwnershipError::Unauthenticated)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(ReconcileError::NotFound {
                region: "eu".into(),
                dates: vec![day]
            }),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn body_has_error_envelope() {
        let response = ApiError::Forbidden("nope".into()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["type"], "forbidden");
        assert_eq!(body["error"]["message"], "nope");
        assert_eq!(body["error"]["statusCode"], 403);
    }
}
