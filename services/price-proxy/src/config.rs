//! Configuration for the price proxy

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable holding the archival provider key
pub const ARCHIVE_KEY_ENV: &str = "CRYPTOCOMPARE_API_KEY";
/// Environment variable holding the recent provider demo key
pub const RECENT_DEMO_KEY_ENV: &str = "CG_DEMO_API_KEY";
/// Environment variable holding the recent provider pro key
pub const RECENT_PRO_KEY_ENV: &str = "CG_PRO_API_KEY";

/// Price proxy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Upstream provider endpoints
    pub providers: ProviderConfig,
    /// Rate limiting configuration
    pub rate_limiting: RateLimitConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Monitoring configuration
    pub monitoring: MonitoringConfig,
    /// Provider API keys, never serialized back out
    #[serde(skip_serializing)]
    pub keys: ProviderKeys,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Whole-request timeout in seconds
    pub timeout_seconds: u64,
    /// Enable compression
    pub compression: bool,
}

/// Upstream provider endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider A base URL used with the demo key
    pub recent_demo_base_url: String,
    /// Provider A base URL used with the pro key
    pub recent_pro_base_url: String,
    /// Provider B daily candle endpoint
    pub archive_histoday_url: String,
    /// Bound on every outbound call, in seconds
    pub upstream_timeout_seconds: u64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per client identity per UTC day, per proxy
    pub daily_limit: u32,
    /// How often stale day buckets are purged
    pub purge_interval_seconds: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS
    pub enabled: bool,
    /// Allowed origins, `*` for any
    pub allowed_origins: Vec<String>,
    /// Max age for preflight requests
    pub max_age_seconds: u64,
}

/// Monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    pub metrics_enabled: bool,
    /// Metrics endpoint path
    pub metrics_path: String,
    /// Health check endpoint path
    pub health_path: String,
}

/// API keys for the upstream providers.
///
/// An empty string counts as "not configured".
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderKeys {
    /// Provider B secret
    pub archive_key: Option<String>,
    /// Provider A demo-tier key
    pub recent_demo_key: Option<String>,
    /// Provider A pro-tier key, wins over the demo key
    pub recent_pro_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            timeout_seconds: 30,
            compression: true,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            recent_demo_base_url: "https://api.coingecko.com/api/v3".to_string(),
            recent_pro_base_url: "https://pro-api.coingecko.com/api/v3".to_string(),
            archive_histoday_url: "https://min-api.cryptocompare.com/data/v2/histoday".to_string(),
            upstream_timeout_seconds: 10,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            daily_limit: 20,
            purge_interval_seconds: 3600,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            max_age_seconds: 86400, // 24 hours
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            metrics_path: "/metrics".to_string(),
            health_path: "/health".to_string(),
        }
    }
}

impl fmt::Debug for ProviderKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(key: &Option<String>) -> &'static str {
            if non_empty(key).is_some() { "<redacted>" } else { "<unset>" }
        }
        f.debug_struct("ProviderKeys")
            .field("archive_key", &redact(&self.archive_key))
            .field("recent_demo_key", &redact(&self.recent_demo_key))
            .field("recent_pro_key", &redact(&self.recent_pro_key))
            .finish()
    }
}

impl ProviderKeys {
    /// Read the well-known secret variables from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            archive_key: std::env::var(ARCHIVE_KEY_ENV).ok(),
            recent_demo_key: std::env::var(RECENT_DEMO_KEY_ENV).ok(),
            recent_pro_key: std::env::var(RECENT_PRO_KEY_ENV).ok(),
        }
    }

    /// Fill keys missing from `self` with the ones in `other`
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self {
            archive_key: non_empty(&self.archive_key)
                .map(str::to_string)
                .or(other.archive_key),
            recent_demo_key: non_empty(&self.recent_demo_key)
                .map(str::to_string)
                .or(other.recent_demo_key),
            recent_pro_key: non_empty(&self.recent_pro_key)
                .map(str::to_string)
                .or(other.recent_pro_key),
        }
    }

    /// Layer the process environment under the configured keys
    #[must_use]
    pub fn merge_env(self) -> Self {
        self.or(Self::from_env())
    }

    #[must_use]
    pub fn archive(&self) -> Option<&str> {
        non_empty(&self.archive_key)
    }

    #[must_use]
    pub fn recent_demo(&self) -> Option<&str> {
        non_empty(&self.recent_demo_key)
    }

    #[must_use]
    pub fn recent_pro(&self) -> Option<&str> {
        non_empty(&self.recent_pro_key)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl ProxyConfig {
    /// Load configuration from file, with `PRICE_PROXY__SECTION__FIELD`
    /// environment overrides
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("PRICE_PROXY").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Get server address
    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
