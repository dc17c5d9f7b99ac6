//! Test helpers and utilities
//!
//! Also pulled into `integration_tests.rs` by path, so nothing here may
//! refer to `crate::`.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
};
use chrono::NaiveDate;
use price_proxy::{ProviderKeys, ProxyConfig, ProxyServer, rate_limiter::ManualClock};
use serde_json::Value;
use std::sync::{Arc, Once};
use tower::ServiceExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ensure tracing is initialized only once across all tests
static INIT: Once = Once::new();

/// Day every [`TestApp`] clock starts on
pub const TEST_TODAY: (i32, u32, u32) = (2025, 3, 10);

/// Initialize test environment
pub fn init_test_env() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "price_proxy=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

/// Calendar day shorthand
pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Configuration with every upstream pointed at `upstream_uri`
pub fn create_test_config(upstream_uri: &str, keys: ProviderKeys) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.server.compression = false;
    config.monitoring.metrics_enabled = false;
    config.providers.recent_demo_base_url = format!("{upstream_uri}/demo/api/v3");
    config.providers.recent_pro_base_url = format!("{upstream_uri}/pro/api/v3");
    config.providers.archive_histoday_url = format!("{upstream_uri}/data/v2/histoday");
    config.providers.upstream_timeout_seconds = 2;
    config.keys = keys;
    config
}

/// Archive key plus a Provider A demo key
pub fn all_keys() -> ProviderKeys {
    ProviderKeys {
        archive_key: Some("archive-secret".to_string()),
        recent_demo_key: Some("demo-secret".to_string()),
        recent_pro_key: None,
    }
}

/// Router driven in-process on a manual clock
pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub server: ProxyServer,
}

impl TestApp {
    pub fn new(config: ProxyConfig) -> Self {
        init_test_env();
        let (y, m, d) = TEST_TODAY;
        let clock = Arc::new(ManualClock::new(day(y, m, d)));
        let server = ProxyServer::with_clock(config, clock.clone());
        let router = server.router().unwrap();
        Self {
            router,
            clock,
            server,
        }
    }

    pub async fn send(&self, method: Method, uri: &str, client_ip: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", client_ip)
            .body(Body::empty())
            .unwrap();
        self.send_request(request).await
    }

    pub async fn send_request(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&self, uri: &str, client_ip: &str) -> TestResponse {
        self.send(Method::GET, uri, client_ip).await
    }
}

/// Fully buffered response
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body)
            .unwrap_or_else(|e| panic!("body is not JSON ({e}): {}", self.body))
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap().to_string()
    }

    fn header_u32(&self, name: &str) -> Option<u32> {
        self.headers.get(name)?.to_str().ok()?.parse().ok()
    }

    pub fn limit(&self) -> Option<u32> {
        self.header_u32("x-ratelimit-limit")
    }

    pub fn remaining(&self) -> Option<u32> {
        self.header_u32("x-ratelimit-remaining")
    }
}
