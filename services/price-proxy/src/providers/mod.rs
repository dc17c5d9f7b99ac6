//! Upstream market-data providers

pub mod archive;
pub mod recent;

pub use archive::{ArchivePriceProxy, ArchiveQuery, Candle};
pub use recent::{RecentPriceProxy, RecentTier, UpstreamReply};

use std::time::Duration;

/// Cache policy stamped on successful and relayed proxy responses
pub const CACHE_CONTROL_VALUE: &str = "public, max-age=60";

/// Shared outbound HTTP client with a bounded per-call timeout
pub fn build_http_client(timeout_seconds: u64) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(concat!("price-proxy/", env!("CARGO_PKG_VERSION")))
        .build()
}
