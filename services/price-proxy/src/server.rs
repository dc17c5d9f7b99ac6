//! Price proxy server implementation

use anyhow::{Context, Result};
use axum::{Router, middleware, routing::any, routing::get};
use std::{net::SocketAddr, sync::Arc, time::Duration, time::Instant};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    config::ProxyConfig,
    handlers::{HealthHandlers, PriceHandlers},
    metrics::{self, ROUTE_ARCHIVE, ROUTE_RECENT},
    middleware::{
        RateLimitState, create_cors_layer, get_only_middleware, logging_middleware,
        rate_limit_middleware,
    },
    providers::{ArchivePriceProxy, RecentPriceProxy, build_http_client},
    rate_limiter::{Clock, DailyRateLimiter, SystemClock},
};

pub const RECENT_PATH: &str = "/price/providerA";
pub const ARCHIVE_PATH: &str = "/price/providerB";

/// Price proxy server
pub struct ProxyServer {
    config: ProxyConfig,
    recent_limiter: Arc<DailyRateLimiter>,
    archive_limiter: Arc<DailyRateLimiter>,
    start_time: Instant,
}

impl ProxyServer {
    /// Create a server on the system clock
    pub fn new(config: ProxyConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a server whose limiters read the day from `clock`.
    /// Each proxy route gets its own limiter.
    pub fn with_clock(config: ProxyConfig, clock: Arc<dyn Clock>) -> Self {
        let recent_limiter = Arc::new(DailyRateLimiter::with_clock(
            &config.rate_limiting,
            Arc::clone(&clock),
        ));
        let archive_limiter = Arc::new(DailyRateLimiter::with_clock(
            &config.rate_limiting,
            clock,
        ));

        Self {
            config,
            recent_limiter,
            archive_limiter,
            start_time: Instant::now(),
        }
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .server_address()
            .parse()
            .with_context(|| format!("Invalid server address '{}'", self.config.server_address()))?;

        if self.config.monitoring.metrics_enabled && !metrics::init_metrics() {
            error!("Metrics requested but no recorder could be installed");
        }

        let app = self.router()?;
        self.spawn_bucket_purger();

        info!("Starting price proxy on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to address {addr}"))?;

        if let Err(e) = axum::serve(listener, app).await {
            error!("Server encountered a fatal error: {}", e);
            return Err(anyhow::anyhow!("Server error: {}", e));
        }

        Ok(())
    }

    /// Build the Axum application with all routes and middleware
    pub fn router(&self) -> Result<Router> {
        let http = build_http_client(self.config.providers.upstream_timeout_seconds)
            .context("Failed to build upstream HTTP client")?;
        let keys = &self.config.keys;
        let recent = Arc::new(RecentPriceProxy::new(
            http.clone(),
            &self.config.providers,
            keys,
        ));
        let archive = Arc::new(ArchivePriceProxy::new(http, &self.config.providers, keys));
        let price_handlers = PriceHandlers::new(recent, archive);

        let health_handlers = HealthHandlers::new(
            price_handlers.clone(),
            Arc::clone(&self.recent_limiter),
            Arc::clone(&self.archive_limiter),
            self.start_time,
        );

        let recent_state = RateLimitState {
            limiter: self.recent_limiter.clone(),
            route: ROUTE_RECENT,
        };
        let archive_state = RateLimitState {
            limiter: self.archive_limiter.clone(),
            route: ROUTE_ARCHIVE,
        };

        // Later layers run first: method check, then the limiter, then the
        // request timeout, then the handler. A timed-out request still gets
        // its rate-limit headers.
        let timeout = TimeoutLayer::new(Duration::from_secs(self.config.server.timeout_seconds));
        let recent_routes = Router::new()
            .route(RECENT_PATH, any(PriceHandlers::recent_price))
            .route_layer(timeout.clone())
            .route_layer(middleware::from_fn_with_state(
                recent_state.clone(),
                rate_limit_middleware,
            ))
            .route_layer(middleware::from_fn_with_state(
                recent_state,
                get_only_middleware,
            ));
        let archive_routes = Router::new()
            .route(ARCHIVE_PATH, any(PriceHandlers::archive_price))
            .route_layer(timeout.clone())
            .route_layer(middleware::from_fn_with_state(
                archive_state.clone(),
                rate_limit_middleware,
            ))
            .route_layer(middleware::from_fn_with_state(
                archive_state,
                get_only_middleware,
            ));

        let monitoring_routes: Router = Router::new()
            .route(&self.config.monitoring.health_path, get(HealthHandlers::health_check))
            .route_layer(timeout)
            .with_state(health_handlers);

        let mut app: Router = recent_routes
            .merge(archive_routes)
            .with_state(price_handlers)
            .merge(monitoring_routes);

        if self.config.monitoring.metrics_enabled {
            app = app.route(
                &self.config.monitoring.metrics_path,
                get(HealthHandlers::metrics),
            );
        }

        let mut app = app
            .layer(middleware::from_fn(logging_middleware))
            .layer(TraceLayer::new_for_http());

        if self.config.server.compression {
            app = app.layer(CompressionLayer::new());
        }
        if self.config.cors.enabled {
            app = app.layer(create_cors_layer(&self.config));
        }

        info!("Price proxy routes configured successfully");
        Ok(app)
    }

    /// Periodically drop limiter buckets from previous days
    fn spawn_bucket_purger(&self) {
        let limiters = [
            Arc::clone(&self.recent_limiter),
            Arc::clone(&self.archive_limiter),
        ];
        let period = Duration::from_secs(self.config.rate_limiting.purge_interval_seconds.max(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                for limiter in &limiters {
                    limiter.purge_expired();
                }
            }
        });
    }

    /// Limiter backing `/price/providerA`
    #[must_use]
    pub fn recent_limiter(&self) -> Arc<DailyRateLimiter> {
        Arc::clone(&self.recent_limiter)
    }

    /// Limiter backing `/price/providerB`
    #[must_use]
    pub fn archive_limiter(&self) -> Arc<DailyRateLimiter> {
        Arc::clone(&self.archive_limiter)
    }
}

/// API route documentation
pub fn print_routes() {
    println!("Price Proxy Routes:");
    println!("===================");
    println!();
    println!("Prices (GET only, daily limit per client IP):");
    println!("  GET  /price/providerA?endpoint=<path>&...            - Recent history passthrough");
    println!("  GET  /price/providerB?symbol=&currency=&date=         - Archival daily OHLC");
    println!();
    println!("Health & Monitoring:");
    println!("  GET  /health                 - Health check");
    println!("  GET  /metrics                - Prometheus metrics");
    println!();
    println!("Every price response carries X-RateLimit-Limit and X-RateLimit-Remaining.");
}
