use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::config::{ScoringConfig, TICKER_24H_PATH};
use crate::error::{AppError, Result};
use crate::types::{ReferenceQuote, TickerEntry};

/// Thin client for the exchange's public 24h ticker endpoint.
pub struct MarketDataClient {
    client: reqwest::Client,
    base_url: String,
}

impl MarketDataClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the full ticker list as raw JSON objects. Parsing and filtering
    /// happen in the snapshot builder so a bad entry never sinks the batch.
    pub async fn fetch_tickers(&self) -> Result<Vec<Value>> {
        let url = format!("{}{}", self.base_url, TICKER_24H_PATH);
        let resp: Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match resp {
            Value::Array(items) => {
                debug!(entries = items.len(), "Ticker list fetched");
                Ok(items)
            }
            _ => Err(AppError::Upstream(
                "ticker/24hr response was not an array".to_string(),
            )),
        }
    }

    pub async fn fetch_reference(&self, symbol: &str) -> Result<ReferenceQuote> {
        let url = format!("{}{}", self.base_url, TICKER_24H_PATH);
        let resp: Value = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_reference(&resp).ok_or_else(|| {
            AppError::Upstream(format!("reference quote for {symbol} is missing price fields"))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Missing symbol, or a required field absent or not numeric.
    Malformed,
    /// Symbol outside the configured quote asset.
    QuoteAsset,
}

/// Parse one raw ticker object.
pub fn parse_ticker_checked(
    v: &Value,
    cfg: &ScoringConfig,
) -> std::result::Result<TickerEntry, Rejection> {
    let symbol = v
        .get("symbol")
        .and_then(|s| s.as_str())
        .filter(|s| !s.is_empty())
        .ok_or(Rejection::Malformed)?;

    if !symbol.ends_with(cfg.quote_asset.as_str()) {
        return Err(Rejection::QuoteAsset);
    }

    let change_pct = num_field(v, "priceChangePercent").ok_or(Rejection::Malformed)?;
    let size = num_field(v, &cfg.size_field)
        .filter(|s| *s >= 0.0)
        .ok_or(Rejection::Malformed)?;

    let secondary_size = cfg
        .secondary_size_field
        .as_deref()
        .and_then(|field| num_field(v, field))
        .filter(|s| *s >= 0.0);

    Ok(TickerEntry {
        symbol: symbol.to_string(),
        change_pct,
        size,
        secondary_size,
        last_price: num_field(v, "lastPrice"),
    })
}

pub fn parse_reference(v: &Value) -> Option<ReferenceQuote> {
    Some(ReferenceQuote {
        symbol: v.get("symbol")?.as_str()?.to_string(),
        last_price: num_field(v, "lastPrice")?,
        change_pct: num_field(v, "priceChangePercent")?,
    })
}

/// Numeric field that may arrive as a JSON number or a decimal string.
fn num_field(v: &Value, key: &str) -> Option<f64> {
    v.get(key)
        .and_then(|x| x.as_f64().or_else(|| x.as_str().and_then(|s| s.trim().parse().ok())))
        .filter(|f: &f64| f.is_finite())
}
