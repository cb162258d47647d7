//! CORS policy for browser clients.
//!
//! - Development: permissive (Allow-Origin: *), without credentials.
//! - Production: exact-match allowlist from `CORS_ALLOWED_ORIGINS`; an empty list allows none.
//!
//! Tokens travel in the `Authorization` header, never in cookies, so credentials stay off.

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;
use crate::middleware::http::REQUEST_ID_HEADER;

fn allow_origin(config: &Config) -> AllowOrigin {
    if !config.app_env.is_production() {
        return AllowOrigin::from(Any);
    }

    let allowed: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|s| match HeaderValue::from_str(s) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %s, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    AllowOrigin::predicate(move |origin: &HeaderValue, _req| allowed.iter().any(|v| v == origin))
}

/// Apply CORS policy to the given Router.
pub fn apply(router: Router, config: &Config) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let cors = CorsLayer::new()
        .allow_origin(allow_origin(config))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            request_id.clone(),
        ])
        .expose_headers([request_id])
        .max_age(Duration::from_secs(60 * 10));

    router.layer(cors)
}
