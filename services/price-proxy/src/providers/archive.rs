//! Provider B: archival daily OHLC candles

use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::{ProviderConfig, ProviderKeys};
use crate::error::{ProxyError, ProxyResult};
use crate::metrics;
use crate::models::{Ohlc, PriceResult};
use crate::utils::{day_of_unix, end_of_day_unix, parse_iso_date, start_of_day_unix};

/// `source` label on normalized archive results
pub const ARCHIVE_SOURCE: &str = "ProviderB";
const DEFAULT_CURRENCY: &str = "USD";
const UPSTREAM_ERROR_FALLBACK: &str = "CryptoCompare error";

/// Raw query parameters of the archive route
#[derive(Debug, Default)]
pub struct ArchiveParams {
    pub symbol: Option<String>,
    pub currency: Option<String>,
    pub date: Option<String>,
}

impl ArchiveParams {
    /// Pick the known keys out of a raw query. A repeated key keeps its
    /// first value; unknown keys are ignored.
    #[must_use]
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "symbol" => &mut params.symbol,
                "currency" => &mut params.currency,
                "date" => &mut params.date,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        params
    }
}

/// Validated archive lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveQuery {
    /// Upper-cased ticker
    pub symbol: String,
    /// Upper-cased quote currency
    pub currency: String,
    pub date: NaiveDate,
    /// Date exactly as requested, echoed in the result
    pub date_raw: String,
}

/// One daily candle from the `histoday` payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volumeto: Option<f64>,
}

impl ArchiveQuery {
    /// Validate raw parameters; `symbol` and `date` are required
    pub fn from_params(params: ArchiveParams) -> ProxyResult<Self> {
        let symbol = params
            .symbol
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty());
        let date_raw = params
            .date
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let (Some(symbol), Some(date_raw)) = (symbol, date_raw) else {
            return Err(ProxyError::BadRequest(
                "Missing 'symbol' and/or 'date' (YYYY-MM-DD)".to_string(),
            ));
        };

        let date = parse_iso_date(&date_raw).ok_or_else(|| {
            ProxyError::BadRequest(format!("Invalid 'date' {date_raw:?} (expected YYYY-MM-DD)"))
        })?;

        let currency = params
            .currency
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        Ok(Self {
            symbol,
            currency,
            date,
            date_raw,
        })
    }
}

/// Candle stamped at midnight of `date`, else the last one returned
#[must_use]
pub fn select_candle(candles: &[Candle], date: NaiveDate) -> Option<&Candle> {
    let midnight = start_of_day_unix(date);
    candles
        .iter()
        .find(|candle| candle.time == midnight)
        .or_else(|| candles.last())
}

/// Build the normalized result from the chosen candle
#[must_use]
pub fn normalize(candle: &Candle, query: &ArchiveQuery) -> PriceResult {
    PriceResult {
        price: candle.close,
        ohlc: Some(Ohlc {
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
        }),
        volume: candle.volumeto,
        market_cap: None,
        source: ARCHIVE_SOURCE.to_string(),
        date_utc: query.date_raw.clone(),
        symbol: query.symbol.clone(),
        currency: query.currency.clone(),
        candle_date_utc: day_of_unix(candle.time).map(|day| day.to_string()),
    }
}

/// Pull `Data.Data` out of a `histoday` payload. `None` when absent or not a list.
pub fn extract_candles(payload: &Value) -> ProxyResult<Option<Vec<Candle>>> {
    match payload.pointer("/Data/Data") {
        Some(list @ Value::Array(_)) => serde_json::from_value(list.clone())
            .map(Some)
            .map_err(|e| ProxyError::Internal(format!("Malformed candle data: {e}"))),
        _ => Ok(None),
    }
}

/// Daily OHLC lookup against Provider B
#[derive(Debug, Clone)]
pub struct ArchivePriceProxy {
    http: reqwest::Client,
    histoday_url: String,
    api_key: Option<String>,
}

impl ArchivePriceProxy {
    pub fn new(http: reqwest::Client, providers: &ProviderConfig, keys: &ProviderKeys) -> Self {
        Self {
            http,
            histoday_url: providers.archive_histoday_url.clone(),
            api_key: keys.archive().map(str::to_string),
        }
    }

    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fetch the candle for `query.date` and normalize it
    pub async fn fetch_daily(&self, query: &ArchiveQuery) -> ProxyResult<PriceResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            error!("No Provider B key configured");
            return Err(ProxyError::Misconfigured(
                "Server missing CRYPTOCOMPARE_API_KEY".to_string(),
            ));
        };

        let to_ts = end_of_day_unix(query.date).to_string();
        let start = Instant::now();
        let result = self
            .http
            .get(&self.histoday_url)
            .query(&[
                ("fsym", query.symbol.as_str()),
                ("tsym", query.currency.as_str()),
                ("toTs", to_ts.as_str()),
                ("limit", "1"),
            ])
            .header(reqwest::header::AUTHORIZATION, format!("Apikey {api_key}"))
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                error!(symbol = %query.symbol, "Provider B request failed: {}", e);
                metrics::record_upstream_call(
                    metrics::ROUTE_ARCHIVE,
                    start.elapsed().as_secs_f64(),
                    false,
                );
                return Err(e.into());
            }
        };

        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let body = response.text().await?;
        metrics::record_upstream_call(
            metrics::ROUTE_ARCHIVE,
            start.elapsed().as_secs_f64(),
            status.is_success(),
        );

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|payload| payload.get("Message")?.as_str().map(str::to_string))
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| UPSTREAM_ERROR_FALLBACK.to_string());
            warn!(status = %status, message = %message, "Provider B returned an error");
            return Err(ProxyError::Upstream { status, message });
        }

        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| ProxyError::Internal(format!("Invalid Provider B payload: {e}")))?;

        let candles = extract_candles(&payload)?.unwrap_or_default();
        let Some(candle) = select_candle(&candles, query.date) else {
            info!(symbol = %query.symbol, date = %query.date, "No historical data found");
            return Err(ProxyError::NotFound("No historical data found".to_string()));
        };

        if candle.time != start_of_day_unix(query.date) {
            warn!(
                symbol = %query.symbol,
                requested = %query.date,
                candle_time = candle.time,
                "No candle at requested midnight, using latest returned"
            );
        }

        Ok(normalize(candle, query))
    }
}
