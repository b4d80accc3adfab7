//! Bybit price fetching module
//! Fetches kline (candlestick) data from the v5 market API

use anyhow::{bail, Context, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::config::Config;
use crate::types::{Bar, BarSource};

const BYBIT_BASE_URL: &str = "https://api.bybit.com";
const RECV_WINDOW: &str = "5000"; // ms, Bybit default

/// Plausible kline start times, 2000-01-01 to 2100-01-01 UTC
const MIN_OPEN_TIME_MS: i64 = 946_684_800_000;
const MAX_OPEN_TIME_MS: i64 = 4_102_444_800_000;

/// Response envelope from the v5 API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KlineResponse {
    ret_code: i64,
    ret_msg: String,
    #[serde(default)]
    result: KlineResult,
}

#[derive(Debug, Default, Deserialize)]
struct KlineResult {
    #[serde(default)]
    list: Vec<Vec<String>>,
}

/// Optional v5 credentials for signed requests
struct ApiCreds {
    key: String,
    secret: String,
}

/// Bybit market data client
pub struct BybitClient {
    client: reqwest::Client,
    base_url: String,
    creds: Option<ApiCreds>,
}

impl BybitClient {
    pub fn new(config: &Config) -> Self {
        let creds = match (&config.bybit_api_key, &config.bybit_api_secret) {
            (Some(key), Some(secret)) => Some(ApiCreds {
                key: key.clone(),
                secret: secret.clone(),
            }),
            _ => None,
        };
        Self {
            client: reqwest::Client::new(),
            base_url: BYBIT_BASE_URL.to_string(),
            creds,
        }
    }
}

impl BarSource for BybitClient {
    async fn fetch_bars(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Bar>> {
        let query = format!("category=linear&symbol={symbol}&interval={interval}&limit={limit}");
        let url = format!("{}/v5/market/kline?{}", self.base_url, query);

        let mut request = self.client.get(&url);
        if let Some(creds) = &self.creds {
            let timestamp = Utc::now().timestamp_millis().to_string();
            let payload = format!("{}{}{}{}", timestamp, creds.key, RECV_WINDOW, query);
            request = request
                .header("X-BAPI-API-KEY", &creds.key)
                .header("X-BAPI-TIMESTAMP", &timestamp)
                .header("X-BAPI-RECV-WINDOW", RECV_WINDOW)
                .header("X-BAPI-SIGN", sign(&creds.secret, &payload));
        }

        let response = request.send().await.context("kline request failed")?;
        if !response.status().is_success() {
            bail!("kline request returned HTTP {}", response.status());
        }
        let envelope: KlineResponse = response
            .json()
            .await
            .context("kline response was not valid JSON")?;
        bars_from_response(envelope)
    }
}

/// HMAC-SHA256 over `timestamp + key + recv_window + query`, hex-encoded
fn sign(secret: &str, payload: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Validate the envelope and normalize rows to oldest-first bars.
/// The v5 API returns rows newest-first.
fn bars_from_response(envelope: KlineResponse) -> Result<Vec<Bar>> {
    if envelope.ret_code != 0 {
        bail!("Bybit error {}: {}", envelope.ret_code, envelope.ret_msg);
    }
    let mut bars = envelope
        .result
        .list
        .iter()
        .map(|row| parse_row(row))
        .collect::<Result<Vec<Bar>>>()?;
    bars.sort_by_key(|bar| bar.open_time_ms);
    for pair in bars.windows(2) {
        if pair[0].open_time_ms >= pair[1].open_time_ms {
            bail!("kline rows are not strictly ordered by open time");
        }
    }
    Ok(bars)
}

/// Parse one v5 kline row: [startTime, open, high, low, close, volume, turnover]
fn parse_row(row: &[String]) -> Result<Bar> {
    if row.len() < 6 {
        bail!("kline row has {} fields, expected at least 6", row.len());
    }
    let bar = Bar {
        open_time_ms: row[0]
            .parse()
            .with_context(|| format!("bad kline start time: {}", row[0]))?,
        open: row[1]
            .parse()
            .with_context(|| format!("bad kline open: {}", row[1]))?,
        high: row[2]
            .parse()
            .with_context(|| format!("bad kline high: {}", row[2]))?,
        low: row[3]
            .parse()
            .with_context(|| format!("bad kline low: {}", row[3]))?,
        close: row[4]
            .parse()
            .with_context(|| format!("bad kline close: {}", row[4]))?,
        volume: row[5]
            .parse()
            .with_context(|| format!("bad kline volume: {}", row[5]))?,
    };
    if !(MIN_OPEN_TIME_MS..=MAX_OPEN_TIME_MS).contains(&bar.open_time_ms) {
        bail!("kline row has an implausible start time: {}", bar.open_time_ms);
    }
    if !bar.is_well_formed() {
        bail!("kline row at {} has inconsistent prices", bar.open_time_ms);
    }
    Ok(bar)
}
