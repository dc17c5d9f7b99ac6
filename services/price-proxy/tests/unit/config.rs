//! Configuration loading tests

use pretty_assertions::assert_eq;
use std::io::Write;

use price_proxy::ProxyConfig;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_partial_file_keeps_defaults() {
    let file = write_config(
        r#"
[server]
port = 9090

[rate_limiting]
daily_limit = 5

[providers]
upstream_timeout_seconds = 3
"#,
    );

    let config = ProxyConfig::from_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.rate_limiting.daily_limit, 5);
    assert_eq!(config.rate_limiting.purge_interval_seconds, 3600);
    assert_eq!(config.providers.upstream_timeout_seconds, 3);
    assert_eq!(
        config.providers.archive_histoday_url,
        "https://min-api.cryptocompare.com/data/v2/histoday"
    );
    assert!(config.cors.enabled);
}

#[test]
fn test_keys_section_is_read() {
    let file = write_config(
        r#"
[keys]
archive_key = "archive-from-file"
recent_pro_key = "pro-from-file"
"#,
    );

    let config = ProxyConfig::from_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.keys.archive(), Some("archive-from-file"));
    assert_eq!(config.keys.recent_pro(), Some("pro-from-file"));
    assert_eq!(config.keys.recent_demo(), None);
}

#[test]
fn test_keys_are_not_serialized() {
    let file = write_config(
        r#"
[keys]
archive_key = "do-not-leak"
"#,
    );

    let config = ProxyConfig::from_file(file.path().to_str().unwrap()).unwrap();
    let rendered = serde_json::to_string(&config).unwrap();
    assert!(!rendered.contains("do-not-leak"));
    assert!(!rendered.contains("keys"));
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(ProxyConfig::from_file("/nonexistent/price-proxy.toml").is_err());
}
