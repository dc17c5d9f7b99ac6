//! REST API models and request/response types

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::rate_limiter::RateLimitStats;

/// Normalized price lookup result.
///
/// Every field is always serialized; values a provider does not supply are `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResult {
    pub price: f64,
    pub ohlc: Option<Ohlc>,
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub source: String,
    /// Requested UTC day, echoed back
    pub date_utc: String,
    pub symbol: String,
    pub currency: String,
    /// UTC day of the candle actually used, when it comes from a candle
    pub candle_date_utc: Option<String>,
}

/// Daily open/high/low/close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlc {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Error response model
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error message
    pub error: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
    /// Whether each upstream provider has a usable key
    pub providers: FxHashMap<String, bool>,
    /// Limiter state per proxy route
    pub rate_limits: FxHashMap<String, RateLimitStats>,
    /// Service version
    pub version: String,
    /// Service uptime in seconds
    pub uptime_seconds: u64,
}
