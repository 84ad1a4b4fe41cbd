use crate::assets::{Asset, ASSETS};
use crate::errors::{EngineError, EngineResult};
use crate::state::AppState;
use reqwest::Client;
use std::sync::Arc;

/// Spot snapshot for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SpotQuote {
    pub price: f64,
    pub change_24h_pct: Option<f64>,
    pub volume: Option<f64>,
}

pub fn build_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .unwrap_or_default()
}

// Binance-compatible 24hr ticker (numbers arrive as strings):
// {
//   "symbol": "BTCUSDT",
//   "priceChangePercent": "-0.650",
//   "lastPrice": "68078.01000000",
//   "volume": "20345.12000000",
//   ...
// }

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerResponse {
    last_price: Option<String>,
    price_change_percent: Option<String>,
    volume: Option<String>,
}

/// GET /api/v3/ticker/24hr
pub async fn fetch_spot_quote(client: &Client, base_url: &str, symbol: &str) -> EngineResult<SpotQuote> {
    let url = format!("{}/api/v3/ticker/24hr?symbol={symbol}", base_url.trim_end_matches('/'));
    let body = get_text(client, &url).await?;
    parse_ticker(&body)
}

/// GET /api/v3/klines, daily candles, oldest first.
pub async fn fetch_daily_closes(
    client: &Client,
    base_url: &str,
    symbol: &str,
    limit: usize,
) -> EngineResult<Vec<f64>> {
    let url = format!(
        "{}/api/v3/klines?symbol={symbol}&interval=1d&limit={limit}",
        base_url.trim_end_matches('/')
    );
    let body = get_text(client, &url).await?;
    parse_klines_closes(&body)
}

async fn get_text(client: &Client, url: &str) -> EngineResult<String> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| EngineError::UpstreamUnavailable(format!("request failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(EngineError::UpstreamUnavailable(format!("HTTP {status}: {body}")));
    }

    Ok(resp.text().await?)
}

fn parse_ticker(body: &str) -> EngineResult<SpotQuote> {
    let data: TickerResponse = serde_json::from_str(body)?;

    let price_str = data
        .last_price
        .as_deref()
        .ok_or_else(|| EngineError::UpstreamUnavailable("ticker has no lastPrice".into()))?;

    let price: f64 = price_str
        .parse()
        .map_err(|_| EngineError::UpstreamUnavailable(format!("invalid price string: {price_str}")))?;

    if price <= 0.0 || !price.is_finite() {
        return Err(EngineError::UpstreamUnavailable(format!("invalid price: {price}")));
    }

    // Optional fields degrade to None rather than failing the quote
    let parse_opt = |s: Option<String>| s.and_then(|v| v.parse::<f64>().ok()).filter(|v| v.is_finite());

    Ok(SpotQuote {
        price,
        change_24h_pct: parse_opt(data.price_change_percent),
        volume: parse_opt(data.volume),
    })
}

// Kline rows: [openTime, "open", "high", "low", "close", "volume", closeTime, ...]
const KLINE_CLOSE_INDEX: usize = 4;

fn parse_klines_closes(body: &str) -> EngineResult<Vec<f64>> {
    let rows: Vec<Vec<serde_json::Value>> = serde_json::from_str(body)?;

    let closes = rows
        .iter()
        .map(|row| {
            row.get(KLINE_CLOSE_INDEX)
                .and_then(|v| match v {
                    serde_json::Value::String(s) => s.parse::<f64>().ok(),
                    serde_json::Value::Number(n) => n.as_f64(),
                    _ => None,
                })
                .filter(|p| p.is_finite() && *p > 0.0)
                .ok_or_else(|| EngineError::UpstreamUnavailable("malformed kline row".into()))
        })
        .collect::<EngineResult<Vec<_>>>()?;

    if closes.is_empty() {
        return Err(EngineError::UpstreamUnavailable("empty kline history".into()));
    }
    Ok(closes)
}

/// Spot quote through the shared cache.
pub async fn cached_spot_quote(state: &AppState, asset: &Asset) -> EngineResult<SpotQuote> {
    if let Some(q) = state.quote_cache.get(&asset.code) {
        return Ok(q);
    }
    let quote = fetch_spot_quote(&state.http, &state.config.exchange_base_url, asset.symbol).await?;
    state.quote_cache.insert(asset.code, quote);
    Ok(quote)
}

/// Keeps the quote cache warm for every listed asset so chain requests
/// rarely wait on the exchange. Backs off on repeated failures.
pub async fn run_quote_warmer(state: Arc<AppState>) {
    tracing::info!("quote warmer started");

    let period = std::time::Duration::from_secs(state.config.quote_cache_ttl_secs.max(1));
    let mut interval = tokio::time::interval(period);
    let mut consecutive_errors: u32 = 0;

    loop {
        interval.tick().await;

        let mut failed = false;
        for asset in ASSETS.iter() {
            match fetch_spot_quote(&state.http, &state.config.exchange_base_url, asset.symbol).await {
                Ok(q) => {
                    state.quote_cache.insert(asset.code, q);
                }
                Err(e) => {
                    failed = true;
                    tracing::warn!(asset = asset.code, error = %e, "quote refresh failed");
                }
            }
        }

        if failed {
            consecutive_errors += 1;
            // Exponential-ish backoff on repeated failures (cap at 30s)
            if consecutive_errors > 3 {
                let backoff = std::cmp::min(consecutive_errors * 2, 30);
                tokio::time::sleep(std::time::Duration::from_secs(backoff as u64)).await;
            }
        } else {
            consecutive_errors = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ticker() {
        let body = r#"{"symbol":"BTCUSDT","priceChange":"-443.0","priceChangePercent":"-0.650",
            "lastPrice":"68078.01000000","volume":"20345.12000000","quoteVolume":"1.0"}"#;
        let q = parse_ticker(body).unwrap();
        assert_eq!(q.price, 68_078.01);
        assert_eq!(q.change_24h_pct, Some(-0.65));
        assert_eq!(q.volume, Some(20_345.12));
    }

    #[test]
    fn test_parse_ticker_optional_fields() {
        let q = parse_ticker(r#"{"lastPrice":"0.5123"}"#).unwrap();
        assert_eq!(q.price, 0.5123);
        assert!(q.change_24h_pct.is_none());
        assert!(q.volume.is_none());
    }

    #[test]
    fn test_parse_ticker_rejects_bad_price() {
        assert!(matches!(
            parse_ticker(r#"{"lastPrice":"0"}"#),
            Err(EngineError::UpstreamUnavailable(_))
        ));
        assert!(parse_ticker(r#"{"lastPrice":"abc"}"#).is_err());
        assert!(parse_ticker(r#"{"code":-1121,"msg":"Invalid symbol."}"#).is_err());
        assert!(parse_ticker("not json").is_err());
    }

    #[test]
    fn test_parse_klines() {
        let body = r#"[
            [1700000000000,"100.0","110.0","95.0","105.5","1000",1700086399999,"0",1,"0","0","0"],
            [1700086400000,"105.5","112.0","101.0","108.25","900",1700172799999,"0",1,"0","0","0"]
        ]"#;
        assert_eq!(parse_klines_closes(body).unwrap(), vec![105.5, 108.25]);
    }

    #[test]
    fn test_parse_klines_rejects_malformed() {
        assert!(parse_klines_closes("[]").is_err());
        assert!(parse_klines_closes(r#"[[1,"1","1"]]"#).is_err());
        assert!(parse_klines_closes(r#"[[1,"1","1","1","-5"]]"#).is_err());
    }
}
