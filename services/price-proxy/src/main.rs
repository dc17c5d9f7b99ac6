//! Price proxy - Main Entry Point

use anyhow::Result;
use clap::{Arg, Command};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use price_proxy::{ProxyConfig, start_server};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "price_proxy=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line arguments
    let matches = Command::new("price-proxy")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Rate-limited proxy for historical crypto price providers")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("price-proxy.toml"),
        )
        .arg(
            Arg::new("routes")
                .long("routes")
                .help("Print available routes and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if matches.get_flag("routes") {
        price_proxy::server::print_routes();
        return Ok(());
    }

    // Load configuration
    let default_config = "price-proxy.toml".to_string();
    let config_path = matches
        .get_one::<String>("config")
        .unwrap_or(&default_config);
    let mut config = match ProxyConfig::from_file(config_path) {
        Ok(config) => {
            info!("Loaded configuration from: {}", config_path);
            config
        }
        Err(e) => {
            warn!("Failed to load config from {}: {}", config_path, e);
            info!("Using default configuration");
            ProxyConfig::default()
        }
    };
    config.keys = std::mem::take(&mut config.keys).merge_env();

    info!(
        "Starting price proxy v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!("Server will bind to: {}", config.server_address());
    info!("Providers:");
    info!(
        "  Recent (A): demo={} pro={}",
        config.keys.recent_demo().is_some(),
        config.keys.recent_pro().is_some()
    );
    info!("  Archive (B): key={}", config.keys.archive().is_some());
    info!("Daily limit per client: {}", config.rate_limiting.daily_limit);
    info!("Features enabled:");
    info!("  CORS: {}", config.cors.enabled);
    info!("  Metrics: {}", config.monitoring.metrics_enabled);
    info!("  Compression: {}", config.server.compression);

    if config.keys.recent_demo().is_none() && config.keys.recent_pro().is_none() {
        warn!("No Provider A key set; /price/providerA will answer 500");
    }
    if config.keys.archive().is_none() {
        warn!("No Provider B key set; /price/providerB will answer 500");
    }

    if let Err(e) = start_server(config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
