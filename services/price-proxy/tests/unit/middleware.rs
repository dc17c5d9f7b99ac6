//! Middleware unit tests

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware,
    routing::any,
};
use rstest::*;
use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};
use tower::ServiceExt;

use price_proxy::{
    middleware::{
        RateLimitState, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, client_identity,
        get_only_middleware, rate_limit_middleware,
    },
    rate_limiter::{RateDecision, RateLimiter},
};

#[rstest]
#[case::netlify_connection_ip_wins(
    &[
        ("x-nf-client-connection-ip", "1.1.1.1"),
        ("x-forwarded-for", "2.2.2.2"),
        ("x-real-ip", "4.4.4.4"),
    ],
    "1.1.1.1"
)]
#[case::first_forwarded_entry(&[("x-forwarded-for", "2.2.2.2, 10.0.0.1, 10.0.0.2")], "2.2.2.2")]
#[case::forwarded_before_client_ip(
    &[("client-ip", "3.3.3.3"), ("x-forwarded-for", "2.2.2.2")],
    "2.2.2.2"
)]
#[case::client_ip_before_real_ip(&[("x-real-ip", "4.4.4.4"), ("client-ip", "3.3.3.3")], "3.3.3.3")]
#[case::real_ip_last(&[("x-real-ip", "4.4.4.4")], "4.4.4.4")]
#[case::empty_header_skipped(&[("x-forwarded-for", ""), ("x-real-ip", "4.4.4.4")], "4.4.4.4")]
#[case::nothing_usable(&[], "unknown")]
fn test_client_identity_priority(
    #[case] headers: &[(&'static str, &'static str)],
    #[case] expected: &str,
) {
    let mut map = HeaderMap::new();
    for &(name, value) in headers {
        map.insert(name, HeaderValue::from_static(value));
    }
    assert_eq!(client_identity(&map), expected);
}

/// Limiter that admits the first `allow` checks and counts every call
struct CountingLimiter {
    allow: u32,
    calls: AtomicU32,
}

#[async_trait]
impl RateLimiter for CountingLimiter {
    async fn check(&self, _client_identity: &str) -> RateDecision {
        let count = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        RateDecision {
            allowed: count <= self.allow,
            current_count: count.min(self.allow),
            limit: self.allow,
        }
    }

    fn limit(&self) -> u32 {
        self.allow
    }
}

fn guarded_router(limiter: Arc<CountingLimiter>) -> Router {
    let state = RateLimitState {
        limiter,
        route: "test",
    };
    Router::new()
        .route("/guarded", any(|| async { "ok" }))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(state, get_only_middleware))
}

fn request(method: Method) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri("/guarded")
        .body(Body::empty())
        .unwrap()
}

#[rstest]
#[case(Method::POST)]
#[case(Method::PUT)]
#[case(Method::DELETE)]
#[tokio::test]
async fn test_non_get_rejected_before_limiter(#[case] method: Method) {
    let limiter = Arc::new(CountingLimiter {
        allow: 5,
        calls: AtomicU32::new(0),
    });
    let response = guarded_router(limiter.clone())
        .oneshot(request(method))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[&X_RATELIMIT_LIMIT], "5");
    assert_eq!(response.headers()[&X_RATELIMIT_REMAINING], "5");
    assert_eq!(limiter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_limiter_consulted_once_per_get() {
    let limiter = Arc::new(CountingLimiter {
        allow: 1,
        calls: AtomicU32::new(0),
    });
    let router = guarded_router(limiter.clone());

    let first = router.clone().oneshot(request(Method::GET)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()[&X_RATELIMIT_REMAINING], "0");

    let second = router.oneshot(request(Method::GET)).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.headers()[&X_RATELIMIT_LIMIT], "1");
    assert_eq!(second.headers()[&X_RATELIMIT_REMAINING], "0");

    let body = axum::body::to_bytes(second.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        body["error"],
        "Daily limit reached (1 per IP). Try again tomorrow."
    );
    assert_eq!(limiter.calls.load(Ordering::SeqCst), 2);
}
