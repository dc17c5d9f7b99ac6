//! Provider A: recent price history, forwarded verbatim

use axum::http::StatusCode;
use reqwest::Url;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::config::{ProviderConfig, ProviderKeys};
use crate::error::{ProxyError, ProxyResult};
use crate::metrics;

const DEMO_KEY_HEADER: &str = "x-cg-demo-api-key";
const PRO_KEY_HEADER: &str = "x-cg-pro-api-key";
const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Provider A access tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecentTier {
    Pro,
    Demo,
}

/// Base URL, auth header and key for the selected tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSelection<'a> {
    pub tier: RecentTier,
    pub base_url: &'a str,
    pub header_name: &'static str,
    pub key: &'a str,
}

/// Upstream answer, relayed without re-parsing
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub content_type: String,
    pub body: String,
}

/// Generic GET forwarder for Provider A
#[derive(Debug, Clone)]
pub struct RecentPriceProxy {
    http: reqwest::Client,
    demo_base_url: String,
    pro_base_url: String,
    keys: ProviderKeys,
}

/// Validate the `endpoint` parameter: present and starting with `/`
pub fn validate_endpoint(endpoint: Option<&str>) -> ProxyResult<&str> {
    match endpoint {
        Some(endpoint) if endpoint.starts_with('/') => Ok(endpoint),
        _ => Err(ProxyError::BadRequest(
            "Missing or invalid 'endpoint' parameter".to_string(),
        )),
    }
}

/// Split the raw query into `endpoint` and the parameters to forward.
/// Order of the forwarded parameters is preserved.
#[must_use]
pub fn split_endpoint(params: Vec<(String, String)>) -> (Option<String>, Vec<(String, String)>) {
    let mut endpoint = None;
    let mut forwarded = Vec::with_capacity(params.len());
    for (key, value) in params {
        if key == "endpoint" {
            endpoint.get_or_insert(value);
        } else {
            forwarded.push((key, value));
        }
    }
    (endpoint, forwarded)
}

impl RecentPriceProxy {
    pub fn new(http: reqwest::Client, providers: &ProviderConfig, keys: &ProviderKeys) -> Self {
        Self {
            http,
            demo_base_url: providers.recent_demo_base_url.trim_end_matches('/').to_string(),
            pro_base_url: providers.recent_pro_base_url.trim_end_matches('/').to_string(),
            keys: keys.clone(),
        }
    }

    /// Pick the pro tier when a pro key exists, else demo, else fail
    pub fn select_tier(&self) -> ProxyResult<TierSelection<'_>> {
        if let Some(key) = self.keys.recent_pro() {
            return Ok(TierSelection {
                tier: RecentTier::Pro,
                base_url: &self.pro_base_url,
                header_name: PRO_KEY_HEADER,
                key,
            });
        }
        if let Some(key) = self.keys.recent_demo() {
            return Ok(TierSelection {
                tier: RecentTier::Demo,
                base_url: &self.demo_base_url,
                header_name: DEMO_KEY_HEADER,
                key,
            });
        }
        error!("No Provider A key configured");
        Err(ProxyError::Misconfigured(
            "Server missing CoinGecko API key (CG_DEMO_API_KEY or CG_PRO_API_KEY)".to_string(),
        ))
    }

    /// Whether any Provider A key is configured
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.select_tier().is_ok()
    }

    /// `base + endpoint + "?" + params`
    pub fn target_url(
        base_url: &str,
        endpoint: &str,
        params: &[(String, String)],
    ) -> ProxyResult<Url> {
        let mut url = Url::parse(&format!("{base_url}{endpoint}"))
            .map_err(|e| ProxyError::BadRequest(format!("Invalid 'endpoint' parameter: {e}")))?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    /// Forward a GET to Provider A with the selected tier's key
    pub async fn forward(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> ProxyResult<UpstreamReply> {
        let selection = self.select_tier()?;
        let url = Self::target_url(selection.base_url, endpoint, params)?;
        debug!(tier = ?selection.tier, endpoint, "Forwarding to Provider A");

        let start = Instant::now();
        let result = self
            .http
            .get(url)
            .header(selection.header_name, selection.key)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                error!(endpoint, "Provider A request failed: {}", e);
                metrics::record_upstream_call(
                    metrics::ROUTE_RECENT,
                    start.elapsed().as_secs_f64(),
                    false,
                );
                return Err(e.into());
            }
        };

        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let body = response.text().await?;

        metrics::record_upstream_call(
            metrics::ROUTE_RECENT,
            start.elapsed().as_secs_f64(),
            status.is_success(),
        );
        info!(
            tier = ?selection.tier,
            endpoint,
            status = %status,
            bytes = body.len(),
            "Provider A response relayed"
        );

        Ok(UpstreamReply {
            status,
            content_type,
            body,
        })
    }
}
