//! CoinGecko price provider implementation

use crate::{
    constants::{
        COINGECKO_COINS_ENDPOINT, COINGECKO_SIMPLE_PRICE_ENDPOINT, QUOTE_CURRENCY, USER_AGENT,
    },
    error::TrackerError,
    provider::MarketPriceProvider,
    shutdown::ShutdownCoordinator,
    types::Observation,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::collections::HashMap;

/// Subset of the `/coins/{id}` response we use
#[derive(Debug, Deserialize)]
struct CoinResponse {
    symbol: String,
}

/// CoinGecko API response for simple price queries
#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    #[serde(flatten)]
    prices: HashMap<String, SimplePriceEntry>,
}

#[derive(Debug, Deserialize)]
struct SimplePriceEntry {
    usd: f64,
    last_updated_at: i64,
}

/// CoinGecko price provider
pub struct CoinGeckoProvider {
    client: Client,
    base_url: Url,
    shutdown: ShutdownCoordinator,
}

impl CoinGeckoProvider {
    /// Creates a new CoinGecko provider
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. `https://api.coingecko.com/api/v3`
    /// * `shutdown` - Checked before every request
    pub fn new(base_url: &str, shutdown: ShutdownCoordinator) -> Result<Self, TrackerError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            TrackerError::invalid_config(format!("invalid API URL '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TrackerError::invalid_config(format!(
                "API URL '{}' cannot be used as a base",
                base_url
            )));
        }

        let client = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            client,
            base_url,
            shutdown,
        })
    }

    /// Appends path segments to the API root
    fn endpoint(&self, path: &str, id: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
            if let Some(id) = id {
                segments.push(id);
            }
        }
        url
    }

    /// Issues a GET request and returns the status and raw body
    async fn get(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<(StatusCode, String), TrackerError> {
        self.shutdown.ensure_running()?;

        tracing::debug!(url = %url, "Requesting CoinGecko");
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        Ok((status, body))
    }
}

/// Extracts the provider's error message from a failed response body
///
/// CoinGecko reports errors as `{"status": {"error_message": "..."}}` or,
/// for unknown coins, `{"error": "..."}`.
fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/status/error_message")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Longest slice of an unstructured error body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 200;

fn api_error(status: StatusCode, body: &str) -> TrackerError {
    let message = extract_error_message(body).unwrap_or_else(|| {
        let body = body.trim();
        if body.is_empty() {
            status.to_string()
        } else if body.chars().count() > MAX_ERROR_BODY_CHARS {
            let head: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            format!("{}: {}…", status, head)
        } else {
            format!("{}: {}", status, body)
        }
    });
    TrackerError::api(status.as_u16(), message)
}

/// Decodes a body in two steps so broken JSON (transient) is told apart
/// from well-formed JSON of the wrong shape (malformed)
fn decode<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, TrackerError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| TrackerError::InvalidBody(format!("{}: {}", what, e)))?;
    serde_json::from_value(value).map_err(|e| TrackerError::malformed(format!("{}: {}", what, e)))
}

/// Interprets a `/coins/{id}` response
fn parse_symbol_response(
    status: StatusCode,
    body: &str,
    coin: &str,
) -> Result<String, TrackerError> {
    if status == StatusCode::NOT_FOUND {
        let reason = extract_error_message(body).unwrap_or_else(|| "coin not found".to_string());
        return Err(TrackerError::not_found(format!("{} ({})", coin, reason)));
    }
    if !status.is_success() {
        return Err(api_error(status, body));
    }

    let response: CoinResponse = decode(body, "coin metadata")?;
    if response.symbol.trim().is_empty() {
        return Err(TrackerError::malformed(format!("empty symbol for {}", coin)));
    }

    Ok(response.symbol.trim().to_uppercase())
}

/// Interprets a `/simple/price` response
fn parse_price_response(
    status: StatusCode,
    body: &str,
    coin: &str,
) -> Result<Observation, TrackerError> {
    if !status.is_success() {
        return Err(api_error(status, body));
    }

    let mut response: SimplePriceResponse = decode(body, "simple price")?;
    let entry = response
        .prices
        .remove(coin)
        .ok_or_else(|| TrackerError::malformed(format!("no price entry for {}", coin)))?;

    Observation::from_unix(entry.usd, entry.last_updated_at).ok_or_else(|| {
        TrackerError::malformed(format!(
            "last_updated_at out of range: {}",
            entry.last_updated_at
        ))
    })
}

#[async_trait]
impl MarketPriceProvider for CoinGeckoProvider {
    async fn resolve_symbol(&self, coin: &str) -> Result<String, TrackerError> {
        let url = self.endpoint(COINGECKO_COINS_ENDPOINT, Some(coin));
        let query = [
            ("localization", "false"),
            ("tickers", "false"),
            ("market_data", "false"),
            ("community_data", "false"),
            ("developer_data", "false"),
        ];

        let (status, body) = self.get(url, &query).await?;
        parse_symbol_response(status, &body, coin)
    }

    async fn fetch_price(&self, coin: &str) -> Result<Observation, TrackerError> {
        let url = self.endpoint(COINGECKO_SIMPLE_PRICE_ENDPOINT, None);
        let query = [
            ("ids", coin),
            ("vs_currencies", QUOTE_CURRENCY),
            ("include_last_updated_at", "true"),
        ];

        let (status, body) = self.get(url, &query).await?;
        let observation = parse_price_response(status, &body, coin)?;

        tracing::debug!(
            coin,
            price = observation.price,
            observed_at = %observation.observed_at,
            "Fetched price from CoinGecko"
        );

        Ok(observation)
    }

    fn provider_name(&self) -> &'static str {
        "coingecko"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn provider(base: &str) -> CoinGeckoProvider {
        CoinGeckoProvider::new(base, ShutdownCoordinator::new()).unwrap()
    }

    #[test]
    fn test_endpoint_building() {
        let p = provider("https://api.coingecko.com/api/v3");
        assert_eq!(
            p.endpoint(COINGECKO_COINS_ENDPOINT, Some("bitcoin")).as_str(),
            "https://api.coingecko.com/api/v3/coins/bitcoin"
        );

        let p = provider("http://localhost:8080/api/v3/");
        assert_eq!(
            p.endpoint(COINGECKO_SIMPLE_PRICE_ENDPOINT, None).as_str(),
            "http://localhost:8080/api/v3/simple/price"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let err = CoinGeckoProvider::new("not a url", ShutdownCoordinator::new())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_symbol_is_uppercased() {
        let body = r#"{"id":"bitcoin","symbol":"btc","name":"Bitcoin"}"#;
        assert_eq!(
            parse_symbol_response(StatusCode::OK, body, "bitcoin").unwrap(),
            "BTC"
        );
    }

    #[test]
    fn test_symbol_not_found_is_terminal() {
        let err = parse_symbol_response(
            StatusCode::NOT_FOUND,
            r#"{"error":"coin not found"}"#,
            "notacoin",
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("notacoin"));
    }

    #[test]
    fn test_symbol_server_error_is_transient() {
        let err = parse_symbol_response(StatusCode::BAD_GATEWAY, "", "bitcoin").unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_rate_limit_message_is_extracted() {
        let body = r#"{"status":{"error_code":429,"error_message":"You've exceeded the Rate Limit."}}"#;
        let err = parse_price_response(StatusCode::TOO_MANY_REQUESTS, body, "bitcoin").unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.diagnostic_message(), "You've exceeded the Rate Limit.");
    }

    #[test]
    fn test_unstructured_error_body_is_truncated() {
        let page = format!("<html>{}</html>", "x".repeat(5_000));
        let err = parse_price_response(StatusCode::BAD_GATEWAY, &page, "bitcoin").unwrap_err();
        let message = err.diagnostic_message();

        assert!(err.is_retryable());
        assert!(message.starts_with("502 Bad Gateway: <html>xxx"));
        assert!(message.ends_with('…'));
        assert_eq!(
            message.chars().count(),
            "502 Bad Gateway: ".len() + MAX_ERROR_BODY_CHARS + 1
        );

        let err = parse_price_response(StatusCode::BAD_GATEWAY, " short ", "bitcoin").unwrap_err();
        assert_eq!(err.diagnostic_message(), "502 Bad Gateway: short");
    }

    #[test]
    fn test_price_not_found_is_transient() {
        let err = parse_price_response(StatusCode::NOT_FOUND, "", "bitcoin").unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_price_response() {
        let body = r#"{"bitcoin":{"usd":67000.5,"last_updated_at":1714564800}}"#;
        let obs = parse_price_response(StatusCode::OK, body, "bitcoin").unwrap();
        assert_eq!(obs.price, 67000.5);
        assert_eq!(obs.timestamp_label(), "2024-05-01T12:00:00");
    }

    #[test]
    fn test_integer_price_is_accepted() {
        let body = r#"{"tether":{"usd":1,"last_updated_at":1714564800}}"#;
        let obs = parse_price_response(StatusCode::OK, body, "tether").unwrap();
        assert_eq!(obs.price, 1.0);
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        for body in [
            r#"{}"#,
            r#"{"bitcoin":{}}"#,
            r#"{"bitcoin":{"usd":67000.5}}"#,
            r#"{"ethereum":{"usd":3000.0,"last_updated_at":1714564800}}"#,
        ] {
            let err = parse_price_response(StatusCode::OK, body, "bitcoin").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedResponse, "body: {body}");
        }
    }

    #[test]
    fn test_invalid_json_is_transient() {
        let err = parse_price_response(StatusCode::OK, "<html>oops</html>", "bitcoin").unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_no_request_after_shutdown() {
        let shutdown = ShutdownCoordinator::new();
        // Unroutable on purpose: the call must fail before touching the network.
        let p = CoinGeckoProvider::new("http://127.0.0.1:9/api/v3", shutdown.clone()).unwrap();
        shutdown.request_shutdown();

        assert!(p.fetch_price("bitcoin").await.unwrap_err().is_shutdown());
        assert!(p.resolve_symbol("bitcoin").await.unwrap_err().is_shutdown());
    }
}
