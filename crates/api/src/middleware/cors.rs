use axum::http::{header, HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

use crate::auth::API_KEY_HEADER;

/// Build the CORS layer. Any origin may call the dashboard API; only the
/// methods and headers the dashboard sends are allowed.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(API_KEY_HEADER),
        ])
}
