//! Price lookup client
//!
//! Chooses a proxy by how old the requested day is, shapes the request for
//! that proxy, and turns its answer into a [`PriceResult`].

use chrono::NaiveDate;
use reqwest::{Url, header::HeaderMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::middleware::{X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING};
use crate::models::PriceResult;
use crate::server::{ARCHIVE_PATH, RECENT_PATH};
use crate::utils::{ISO_DATE_FORMAT, to_ddmmyyyy};

/// Days of history served by Provider A; anything older goes to Provider B
pub const RECENT_WINDOW_DAYS: i64 = 365;
/// `source` label on results built from Provider A payloads
pub const RECENT_SOURCE: &str = "ProviderA";
const SEARCH_LIMIT: usize = 8;

/// Which proxy serves a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProviderRoute {
    Recent,
    Archive,
}

/// Whole days between the two calendar days, direction ignored
#[must_use]
pub fn age_days(requested: NaiveDate, today: NaiveDate) -> i64 {
    (today - requested).num_days().abs()
}

/// Provider A up to and including [`RECENT_WINDOW_DAYS`] days back, else Provider B
#[must_use]
pub fn select_route(requested: NaiveDate, today: NaiveDate) -> ProviderRoute {
    if age_days(requested, today) <= RECENT_WINDOW_DAYS {
        ProviderRoute::Recent
    } else {
        ProviderRoute::Archive
    }
}

/// A coin as returned by Provider A's search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinRef {
    /// Provider A identifier, e.g. `bitcoin`
    pub id: String,
    pub name: String,
    /// Ticker, e.g. `BTC`
    pub symbol: String,
    #[serde(default)]
    pub thumb: Option<String>,
}

/// Limiter state read from `X-RateLimit-*` headers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
}

impl RateLimitInfo {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse().ok())
        };
        Self {
            limit: read(X_RATELIMIT_LIMIT.as_str()),
            remaining: read(X_RATELIMIT_REMAINING.as_str()),
        }
    }
}

/// Successful lookup
#[derive(Debug, Clone, Serialize)]
pub struct PriceLookup {
    pub route: ProviderRoute,
    pub result: PriceResult,
    pub rate_limit: RateLimitInfo,
}

/// Client-side lookup failures
#[derive(Debug, Error)]
pub enum LookupError {
    /// Transport failure talking to the proxy
    #[error("Proxy request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Proxy answered with a non-OK status
    #[error("Price lookup failed: {status} {body}")]
    Proxy {
        status: u16,
        body: String,
        rate_limit: RateLimitInfo,
    },

    /// Provider A had no price for the coin, day and currency
    #[error("Price not available for that token/date/currency.")]
    PriceUnavailable,

    /// Archive lookups need a ticker symbol
    #[error("Missing token symbol for historical lookup.")]
    MissingSymbol,

    #[error("Invalid proxy URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid proxy response: {0}")]
    Decode(String),
}

/// Price, market cap and volume for `currency` out of a Provider A history payload
#[must_use]
pub fn extract_recent_quote(
    payload: &Value,
    currency: &str,
) -> Option<(f64, Option<f64>, Option<f64>)> {
    let currency = currency.to_lowercase();
    let market_data = payload.get("market_data")?;
    let field = |name: &str| market_data.get(name)?.get(&currency)?.as_f64();

    let price = field("current_price")?;
    Some((price, field("market_cap"), field("total_volume")))
}

/// Provider A history path with `coin_id` percent-encoded as a single segment
pub fn history_endpoint(coin_id: &str) -> Result<String, LookupError> {
    let mut url = Url::parse("http://provider.invalid/coins")
        .map_err(|e| LookupError::InvalidUrl(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| LookupError::InvalidUrl(format!("cannot encode coin id {coin_id:?}")))?
        .push(coin_id)
        .push("history");
    Ok(url.path().to_string())
}

/// HTTP client for the two price proxies
#[derive(Debug, Clone)]
pub struct PriceLookupClient {
    http: reqwest::Client,
    base_url: String,
}

impl PriceLookupClient {
    /// Client for a proxy served at `base_url`, e.g. `http://127.0.0.1:8080`
    pub fn new(base_url: &str) -> Result<Self, LookupError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, LookupError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| LookupError::InvalidUrl(format!("{base_url}: {e}")))?;
        Ok(Self { http, base_url })
    }

    fn proxy_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, LookupError> {
        let mut url = Url::parse(&format!("{}{path}", self.base_url))
            .map_err(|e| LookupError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    /// Provider A request for a coin's history on `date`
    pub fn recent_request_url(&self, coin_id: &str, date: NaiveDate) -> Result<Url, LookupError> {
        let endpoint = history_endpoint(coin_id)?;
        let date = to_ddmmyyyy(date);
        self.proxy_url(
            RECENT_PATH,
            &[
                ("endpoint", endpoint.as_str()),
                ("date", date.as_str()),
                ("localization", "false"),
            ],
        )
    }

    /// Provider B request for a ticker's daily candle on `date`
    pub fn archive_request_url(
        &self,
        symbol: &str,
        currency: &str,
        date: NaiveDate,
    ) -> Result<Url, LookupError> {
        let date = date.format(ISO_DATE_FORMAT).to_string();
        self.proxy_url(
            ARCHIVE_PATH,
            &[
                ("symbol", symbol),
                ("currency", currency),
                ("date", date.as_str()),
            ],
        )
    }

    /// Look up `coin`'s price on `date`, routing by age relative to `today`
    pub async fn lookup(
        &self,
        coin: &CoinRef,
        date: NaiveDate,
        currency: &str,
        today: NaiveDate,
    ) -> Result<PriceLookup, LookupError> {
        let route = select_route(date, today);
        info!(coin = %coin.id, date = %date, route = ?route, "Price lookup");

        match route {
            ProviderRoute::Recent => self.lookup_recent(coin, date, currency).await,
            ProviderRoute::Archive => self.lookup_archive(coin, date, currency).await,
        }
    }

    async fn lookup_recent(
        &self,
        coin: &CoinRef,
        date: NaiveDate,
        currency: &str,
    ) -> Result<PriceLookup, LookupError> {
        let url = self.recent_request_url(&coin.id, date)?;
        let (payload, rate_limit) = self.get_json(url).await?;

        let (price, market_cap, volume) =
            extract_recent_quote(&payload, currency).ok_or(LookupError::PriceUnavailable)?;

        Ok(PriceLookup {
            route: ProviderRoute::Recent,
            result: PriceResult {
                price,
                ohlc: None,
                volume,
                market_cap,
                source: RECENT_SOURCE.to_string(),
                date_utc: date.format(ISO_DATE_FORMAT).to_string(),
                symbol: coin.symbol.to_uppercase(),
                currency: currency.to_uppercase(),
                candle_date_utc: None,
            },
            rate_limit,
        })
    }

    async fn lookup_archive(
        &self,
        coin: &CoinRef,
        date: NaiveDate,
        currency: &str,
    ) -> Result<PriceLookup, LookupError> {
        let symbol = coin.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(LookupError::MissingSymbol);
        }

        let url = self.archive_request_url(&symbol, &currency.to_uppercase(), date)?;
        let (payload, rate_limit) = self.get_json(url).await?;
        let result: PriceResult =
            serde_json::from_value(payload).map_err(|e| LookupError::Decode(e.to_string()))?;

        Ok(PriceLookup {
            route: ProviderRoute::Archive,
            result,
            rate_limit,
        })
    }

    /// Search coins through Provider A, first matches only.
    ///
    /// Goes through the Provider A proxy, so every non-blank search counts
    /// against the caller's daily limit like a price lookup does.
    pub async fn search(&self, query: &str) -> Result<Vec<CoinRef>, LookupError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.proxy_url(RECENT_PATH, &[("endpoint", "/search"), ("query", query)])?;
        let (payload, _) = self.get_json(url).await?;

        let coins = match payload.get("coins") {
            Some(coins) => serde_json::from_value::<Vec<CoinRef>>(coins.clone())
                .map_err(|e| LookupError::Decode(e.to_string()))?,
            None => Vec::new(),
        };
        Ok(coins.into_iter().take(SEARCH_LIMIT).collect())
    }

    async fn get_json(&self, url: Url) -> Result<(Value, RateLimitInfo), LookupError> {
        debug!(url = %url, "Calling price proxy");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let rate_limit = RateLimitInfo::from_headers(response.headers());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::Proxy {
                status: status.as_u16(),
                body,
                rate_limit,
            });
        }

        let payload = response
            .json::<Value>()
            .await
            .map_err(|e| LookupError::Decode(e.to_string()))?;
        Ok((payload, rate_limit))
    }
}
