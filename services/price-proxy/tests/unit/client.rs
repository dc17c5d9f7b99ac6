//! Price lookup client tests against a stand-in proxy

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

use price_proxy::client::{CoinRef, LookupError, PriceLookupClient, ProviderRoute};

use super::helpers::day;

fn bitcoin() -> CoinRef {
    CoinRef {
        id: "bitcoin".to_string(),
        name: "Bitcoin".to_string(),
        symbol: "btc".to_string(),
        thumb: None,
    }
}

fn history_payload() -> serde_json::Value {
    json!({
        "id": "bitcoin",
        "symbol": "btc",
        "market_data": {
            "current_price": {"usd": 67012.5, "eur": 61990.0},
            "market_cap": {"usd": 1.32e12},
            "total_volume": {"usd": 2.8e10}
        }
    })
}

#[tokio::test]
async fn test_recent_lookup_uses_provider_a() {
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/price/providerA"))
        .and(query_param("endpoint", "/coins/bitcoin/history"))
        .and(query_param("date", "02-06-2025"))
        .and(query_param("localization", "false"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-limit", "20")
                .insert_header("x-ratelimit-remaining", "17")
                .set_body_json(history_payload()),
        )
        .expect(1)
        .mount(&proxy)
        .await;

    let client = PriceLookupClient::new(&proxy.uri()).unwrap();
    let lookup = client
        .lookup(&bitcoin(), day(2025, 6, 2), "USD", day(2025, 6, 15))
        .await
        .unwrap();

    assert_eq!(lookup.route, ProviderRoute::Recent);
    assert_eq!(lookup.result.price, 67012.5);
    assert_eq!(lookup.result.market_cap, Some(1.32e12));
    assert_eq!(lookup.result.volume, Some(2.8e10));
    assert_eq!(lookup.result.source, "ProviderA");
    assert_eq!(lookup.result.symbol, "BTC");
    assert_eq!(lookup.result.currency, "USD");
    assert_eq!(lookup.result.date_utc, "2025-06-02");
    assert_eq!(lookup.rate_limit.limit, Some(20));
    assert_eq!(lookup.rate_limit.remaining, Some(17));
}

#[tokio::test]
async fn test_exactly_one_year_old_still_uses_provider_a() {
    let proxy = MockServer::start().await;
    Mock::given(path("/price/providerA"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_payload()))
        .expect(1)
        .mount(&proxy)
        .await;
    Mock::given(path("/price/providerB"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&proxy)
        .await;

    let client = PriceLookupClient::new(&proxy.uri()).unwrap();
    let lookup = client
        .lookup(&bitcoin(), day(2024, 6, 15), "usd", day(2025, 6, 15))
        .await
        .unwrap();
    assert_eq!(lookup.route, ProviderRoute::Recent);
}

#[tokio::test]
async fn test_old_lookup_uses_provider_b() {
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/price/providerB"))
        .and(query_param("symbol", "BTC"))
        .and(query_param("currency", "USD"))
        .and(query_param("date", "2015-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "price": 314.25,
            "ohlc": {"open": 310.0, "high": 320.0, "low": 305.0, "close": 314.25},
            "volume": 1000.0,
            "marketCap": null,
            "source": "ProviderB",
            "dateUtc": "2015-01-01",
            "symbol": "BTC",
            "currency": "USD",
            "candleDateUtc": "2015-01-01"
        })))
        .expect(1)
        .mount(&proxy)
        .await;

    let client = PriceLookupClient::new(&proxy.uri()).unwrap();
    let lookup = client
        .lookup(&bitcoin(), day(2015, 1, 1), "usd", day(2025, 6, 15))
        .await
        .unwrap();

    assert_eq!(lookup.route, ProviderRoute::Archive);
    assert_eq!(lookup.result.price, 314.25);
    assert_eq!(lookup.result.ohlc.unwrap().open, 310.0);
    assert_eq!(lookup.result.source, "ProviderB");
}

#[tokio::test]
async fn test_missing_currency_is_unavailable() {
    let proxy = MockServer::start().await;
    Mock::given(path("/price/providerA"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_payload()))
        .mount(&proxy)
        .await;

    let client = PriceLookupClient::new(&proxy.uri()).unwrap();
    let result = client
        .lookup(&bitcoin(), day(2025, 6, 2), "gbp", day(2025, 6, 15))
        .await;
    assert_matches!(result, Err(LookupError::PriceUnavailable));
}

#[tokio::test]
async fn test_archive_lookup_needs_symbol() {
    let client = PriceLookupClient::new("http://127.0.0.1:9").unwrap();
    let coin = CoinRef {
        symbol: "  ".to_string(),
        ..bitcoin()
    };
    let result = client
        .lookup(&coin, day(2015, 1, 1), "usd", day(2025, 6, 15))
        .await;
    assert_matches!(result, Err(LookupError::MissingSymbol));
}

#[tokio::test]
async fn test_rate_limited_response_surfaces_headers() {
    let proxy = MockServer::start().await;
    Mock::given(path("/price/providerB"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-ratelimit-limit", "20")
                .insert_header("x-ratelimit-remaining", "0")
                .set_body_json(json!({
                    "error": "Daily limit reached (20 per IP). Try again tomorrow."
                })),
        )
        .mount(&proxy)
        .await;

    let client = PriceLookupClient::new(&proxy.uri()).unwrap();
    let result = client
        .lookup(&bitcoin(), day(2015, 1, 1), "usd", day(2025, 6, 15))
        .await;

    assert_matches!(
        result,
        Err(LookupError::Proxy { status: 429, ref body, rate_limit })
            if body.contains("Daily limit reached") && rate_limit.remaining == Some(0)
    );
}

#[tokio::test]
async fn test_search_keeps_first_eight() {
    let proxy = MockServer::start().await;
    let coins: Vec<_> = (0..12)
        .map(|i| {
            json!({
                "id": format!("coin-{i}"),
                "name": format!("Coin {i}"),
                "symbol": format!("C{i}"),
                "thumb": format!("https://img.example/{i}.png"),
                "market_cap_rank": i
            })
        })
        .collect();
    Mock::given(path("/price/providerA"))
        .and(query_param("endpoint", "/search"))
        .and(query_param("query", "coin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "coins": coins,
            "exchanges": []
        })))
        .expect(1)
        .mount(&proxy)
        .await;

    let client = PriceLookupClient::new(&proxy.uri()).unwrap();
    let found = client.search(" coin ").await.unwrap();

    assert_eq!(found.len(), 8);
    assert_eq!(found[0].id, "coin-0");
    assert_eq!(found[7].symbol, "C7");
}

#[tokio::test]
async fn test_blank_search_skips_the_proxy() {
    let proxy = MockServer::start().await;
    Mock::given(path("/price/providerA"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&proxy)
        .await;

    let client = PriceLookupClient::new(&proxy.uri()).unwrap();
    assert!(client.search("   ").await.unwrap().is_empty());
}
