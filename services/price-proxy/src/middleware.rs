//! Middleware for method filtering, rate limiting, and request logging

use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::metrics;
use crate::rate_limiter::{RateDecision, RateLimiter};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Headers consulted for the client identity, highest priority first
pub const CLIENT_IDENTITY_HEADERS: [&str; 4] = [
    "x-nf-client-connection-ip",
    "x-forwarded-for",
    "client-ip",
    "x-real-ip",
];

/// Rate limiting middleware state
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<dyn RateLimiter>,
    /// Route label for logs and metrics
    pub route: &'static str,
}

impl std::fmt::Debug for RateLimitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitState")
            .field("limiter", &"Arc<dyn RateLimiter>")
            .field("route", &self.route)
            .finish()
    }
}

/// Best-effort client identity from request headers, `"unknown"` if none.
///
/// Only the first entry of a forwarding chain is used. Not authenticated.
#[must_use]
pub fn client_identity(headers: &HeaderMap) -> String {
    CLIENT_IDENTITY_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(',').next())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map_or_else(|| "unknown".to_string(), str::to_string)
}

/// Attach `X-RateLimit-Limit` and `X-RateLimit-Remaining`
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining()));
}

/// Reject anything but GET before the limiter is consulted
pub async fn get_only_middleware(
    State(rate_limit_state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() == Method::GET {
        return next.run(request).await;
    }

    warn!(
        method = %request.method(),
        route = rate_limit_state.route,
        "Rejected non-GET request"
    );
    let mut response = ProxyError::MethodNotAllowed.into_response();
    let placeholder = RateDecision::placeholder(rate_limit_state.limiter.limit());
    apply_rate_limit_headers(response.headers_mut(), &placeholder);
    response
}

/// Daily rate limiting middleware.
///
/// Runs once per request before the handler, and stamps the resulting
/// limiter state on whatever response comes back.
pub async fn rate_limit_middleware(
    State(rate_limit_state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let client_ip = client_identity(request.headers());
    let decision = rate_limit_state.limiter.check(&client_ip).await;

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        warn!(
            client_ip = %client_ip,
            route = rate_limit_state.route,
            count = decision.current_count,
            "Daily rate limit exceeded"
        );
        metrics::record_rate_limited(rate_limit_state.route);
        ProxyError::RateLimited {
            limit: decision.limit,
        }
        .into_response()
    };

    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = std::time::Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let route = metrics::route_label(
        request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str),
    );
    let client_ip = client_identity(request.headers());
    let request_id = uuid::Uuid::new_v4();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = duration.as_millis(),
        client_ip = %client_ip,
        "Request processed"
    );
    metrics::record_http_request(
        route,
        status.as_u16(),
        duration.as_secs_f64(),
    );

    response
}

/// CORS layer factory. Browsers may only read the rate-limit headers if
/// they are exposed explicitly.
pub fn create_cors_layer(config: &ProxyConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING])
        .max_age(std::time::Duration::from_secs(config.cors.max_age_seconds));

    if config.cors.allowed_origins.iter().any(|origin| origin == "*") {
        return cors.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    cors.allow_origin(origins)
}
