//! Health check and monitoring handlers

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use rustc_hash::FxHashMap;
use std::{sync::Arc, time::Instant};
use tracing::debug;

use crate::{
    handlers::PriceHandlers,
    metrics::{self, ROUTE_ARCHIVE, ROUTE_RECENT},
    models::HealthCheckResponse,
    rate_limiter::DailyRateLimiter,
};

/// Health check handlers
#[derive(Clone)]
pub struct HealthHandlers {
    price_handlers: PriceHandlers,
    recent_limiter: Arc<DailyRateLimiter>,
    archive_limiter: Arc<DailyRateLimiter>,
    start_time: Instant,
}

impl HealthHandlers {
    pub const fn new(
        price_handlers: PriceHandlers,
        recent_limiter: Arc<DailyRateLimiter>,
        archive_limiter: Arc<DailyRateLimiter>,
        start_time: Instant,
    ) -> Self {
        Self {
            price_handlers,
            recent_limiter,
            archive_limiter,
            start_time,
        }
    }

    /// Health check endpoint. `degraded` when a provider has no key.
    pub async fn health_check(State(handlers): State<Self>) -> Json<HealthCheckResponse> {
        debug!("Health check request");

        let mut providers = FxHashMap::default();
        providers.insert(
            ROUTE_RECENT.to_string(),
            handlers.price_handlers.recent_configured(),
        );
        providers.insert(
            ROUTE_ARCHIVE.to_string(),
            handlers.price_handlers.archive_configured(),
        );

        let mut rate_limits = FxHashMap::default();
        rate_limits.insert(ROUTE_RECENT.to_string(), handlers.recent_limiter.stats());
        rate_limits.insert(ROUTE_ARCHIVE.to_string(), handlers.archive_limiter.stats());

        let status = if providers.values().all(|configured| *configured) {
            "healthy"
        } else {
            "degraded"
        };

        Json(HealthCheckResponse {
            status: status.to_string(),
            providers,
            rate_limits,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: handlers.start_time.elapsed().as_secs(),
        })
    }

    /// Prometheus metrics endpoint
    pub async fn metrics() -> Response {
        match metrics::render() {
            Some(body) => (
                [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                body,
            )
                .into_response(),
            None => (StatusCode::NOT_FOUND, "Metrics exporter not installed").into_response(),
        }
    }
}
