//! Historical crypto price proxy
//!
//! Rate-limited HTTP proxy in front of two market-data providers.
//! Features:
//! - Provider A: generic GET forwarder with demo/pro key injection
//! - Provider B: archival daily OHLC lookup with normalized output
//! - Per-client, per-UTC-day request limits on each proxy
//! - Client-side provider selection by date age

#![allow(missing_docs)]

use anyhow::Result;

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod providers;
pub mod rate_limiter;
pub mod server;
pub mod utils;

pub use config::{
    CorsConfig, MonitoringConfig, ProviderConfig, ProviderKeys, ProxyConfig, RateLimitConfig,
    ServerConfig,
};
pub use error::ProxyError;
pub use server::ProxyServer;

/// Start the price proxy server
pub async fn start_server(config: ProxyConfig) -> Result<()> {
    let server = ProxyServer::new(config);
    server.start().await
}
