//! Price proxy handlers
//!
//! Method filtering and rate limiting happen in middleware before these run.

use axum::{
    extract::{Query, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    error::ProxyResult,
    providers::{
        ArchivePriceProxy, ArchiveQuery, CACHE_CONTROL_VALUE, RecentPriceProxy,
        archive::ArchiveParams,
        recent::{split_endpoint, validate_endpoint},
    },
};

/// Price handlers
#[derive(Clone)]
pub struct PriceHandlers {
    recent: Arc<RecentPriceProxy>,
    archive: Arc<ArchivePriceProxy>,
}

impl PriceHandlers {
    pub const fn new(recent: Arc<RecentPriceProxy>, archive: Arc<ArchivePriceProxy>) -> Self {
        Self { recent, archive }
    }

    /// `GET /price/providerA?endpoint=<path>&...`
    pub async fn recent_price(
        State(handlers): State<Self>,
        Query(params): Query<Vec<(String, String)>>,
    ) -> ProxyResult<Response> {
        let (endpoint, forwarded) = split_endpoint(params);
        let endpoint = validate_endpoint(endpoint.as_deref())?;

        let reply = handlers
            .recent
            .forward(endpoint, &forwarded)
            .await
            .inspect_err(|e| error!(endpoint, "Provider A proxy failed: {}", e))?;

        let content_type = HeaderValue::from_str(&reply.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/json"));
        let mut response = (reply.status, reply.body).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, content_type);
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_VALUE),
        );
        Ok(response)
    }

    /// `GET /price/providerB?symbol=<SYM>&currency=<CCY>&date=<YYYY-MM-DD>`
    pub async fn archive_price(
        State(handlers): State<Self>,
        Query(params): Query<Vec<(String, String)>>,
    ) -> ProxyResult<Response> {
        let query = ArchiveQuery::from_params(ArchiveParams::from_pairs(params))?;
        info!(
            symbol = %query.symbol,
            currency = %query.currency,
            date = %query.date,
            "Archive price request"
        );

        let result = handlers
            .archive
            .fetch_daily(&query)
            .await
            .inspect_err(|e| error!(symbol = %query.symbol, "Provider B proxy failed: {}", e))?;

        let mut response = Json(result).into_response();
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_VALUE),
        );
        Ok(response)
    }

    #[must_use]
    pub fn recent_configured(&self) -> bool {
        self.recent.is_configured()
    }

    #[must_use]
    pub fn archive_configured(&self) -> bool {
        self.archive.is_configured()
    }
}
