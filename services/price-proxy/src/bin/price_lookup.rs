//! Command-line client for the price proxy

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use price_proxy::client::{CoinRef, PriceLookupClient};
use price_proxy::utils::parse_iso_date;

#[derive(Parser, Debug)]
#[command(name = "price-lookup", version, about = "Look up a coin's price on a past date")]
struct Cli {
    /// Base URL of the running price proxy
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "PRICE_PROXY_URL")]
    proxy_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Price of a coin on a UTC day
    Price {
        /// Provider A coin id, e.g. `bitcoin`
        #[arg(long)]
        coin: String,
        /// Ticker symbol, e.g. `BTC`; used for dates older than a year
        #[arg(long)]
        symbol: String,
        /// Day to look up, YYYY-MM-DD
        #[arg(long)]
        date: String,
        #[arg(long, default_value = "usd")]
        currency: String,
    },
    /// Search coins by name or ticker
    Search {
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "price_proxy=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let client = PriceLookupClient::new(&cli.proxy_url)?;

    match cli.command {
        Commands::Price {
            coin,
            symbol,
            date,
            currency,
        } => {
            let date = parse_iso_date(&date)
                .with_context(|| format!("Invalid date {date:?}, expected YYYY-MM-DD"))?;
            let coin = CoinRef {
                name: coin.clone(),
                id: coin,
                symbol,
                thumb: None,
            };

            let lookup = client
                .lookup(&coin, date, &currency, Utc::now().date_naive())
                .await?;
            println!("{}", serde_json::to_string_pretty(&lookup)?);
            if let (Some(remaining), Some(limit)) =
                (lookup.rate_limit.remaining, lookup.rate_limit.limit)
            {
                eprintln!("Requests left today: {remaining}/{limit}");
            }
        }
        Commands::Search { query } => {
            for coin in client.search(&query).await? {
                println!("{:<24} {:<8} {}", coin.id, coin.symbol.to_uppercase(), coin.name);
            }
        }
    }

    Ok(())
}
