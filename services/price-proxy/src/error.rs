//! Error types for the price proxies

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::ErrorBody;

/// Proxy-level failures. Every variant is terminal for the request.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Anything other than GET
    #[error("Method Not Allowed")]
    MethodNotAllowed,

    /// Missing or invalid required parameter
    #[error("{0}")]
    BadRequest(String),

    /// Daily quota for this client identity is exhausted
    #[error("Daily limit reached ({limit} per IP). Try again tomorrow.")]
    RateLimited {
        /// The configured daily limit
        limit: u32,
    },

    /// A required provider secret is not configured
    #[error("{0}")]
    Misconfigured(String),

    /// Provider answered with a non-OK status
    #[error("{message}")]
    Upstream {
        /// Status relayed from the provider
        status: StatusCode,
        /// Provider error message
        message: String,
    },

    /// Provider had no data for the requested day
    #[error("{0}")]
    NotFound(String),

    /// Outbound call exceeded the configured bound
    #[error("Upstream request timed out")]
    TimedOut,

    /// Unexpected failure
    #[error("Proxy error: {0}")]
    Internal(String),
}

/// Type alias for proxy results
pub type ProxyResult<T> = Result<T, ProxyError>;

impl ProxyError {
    /// Transport status for this error
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Misconfigured(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { status, .. } => *status,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::TimedOut => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::TimedOut
        } else {
            Self::Internal(error.to_string())
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
