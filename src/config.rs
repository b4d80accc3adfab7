//! Runtime configuration
//!
//! Everything is read from the environment once at startup (a `.env` file is
//! honored) and validated before any network call is made. A bad value here
//! is fatal; the loop never starts on a half-checked config.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

const DEFAULT_SYMBOL: &str = "SOLUSDT";
const DEFAULT_INTERVAL: &str = "60"; // Bybit interval code, in minutes
const DEFAULT_PERIOD: usize = 14;
const DEFAULT_UPPER: f64 = 70.0;
const DEFAULT_LOWER: f64 = 30.0;
const DEFAULT_RETRY_BACKOFF_SECS: u64 = 1;
const DEFAULT_BOUNDARY_BUFFER_SECS: u64 = 2; // grace for the exchange to publish the closed bar
const MAX_DELAY_SECS: u64 = 86_400; // ceiling for the delay tunables, one day

/// Interval codes accepted on the kline endpoint, minutes plus daily
const MINUTE_CODES: [&str; 10] = ["1", "3", "5", "15", "30", "60", "120", "240", "360", "720"];

#[derive(Debug, Clone)]
pub struct Config {
    pub symbol: String,
    pub interval: String,
    pub interval_ms: i64,
    pub period: usize,
    pub upper: f64,
    pub lower: f64,
    pub retry_backoff: Duration,
    pub boundary_buffer_ms: i64,
    pub discord_token: String,
    pub discord_channel_id: u64,
    pub bybit_api_key: Option<String>,
    pub bybit_api_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        let discord_token = env::var("DISCORD_BOT_TOKEN").context("DISCORD_BOT_TOKEN must be set")?;
        let channel_raw = env::var("DISCORD_CHANNEL_ID").context("DISCORD_CHANNEL_ID must be set")?;
        let discord_channel_id = channel_raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("DISCORD_CHANNEL_ID must be a numeric channel id, got {channel_raw:?}"))?;

        let bybit_api_key = env::var("BYBIT_API_KEY").ok();
        let bybit_api_secret = env::var("BYBIT_API_SECRET").ok();
        if bybit_api_key.is_some() != bybit_api_secret.is_some() {
            bail!("BYBIT_API_KEY and BYBIT_API_SECRET must be set together");
        }

        let symbol = env_or("RSI_SYMBOL", DEFAULT_SYMBOL);
        let interval = env_or("RSI_INTERVAL", DEFAULT_INTERVAL);
        let interval_ms = interval_to_ms(&interval)
            .with_context(|| format!("RSI_INTERVAL must be one of {MINUTE_CODES:?} or D, got {interval:?}"))?;

        let period: usize = parsed_env("RSI_PERIOD", DEFAULT_PERIOD)?;
        if period < 2 {
            bail!("RSI_PERIOD must be at least 2, got {period}");
        }

        let upper: f64 = parsed_env("RSI_UPPER", DEFAULT_UPPER)?;
        let lower: f64 = parsed_env("RSI_LOWER", DEFAULT_LOWER)?;
        if !(0.0 < lower && lower < upper && upper < 100.0) {
            bail!("thresholds must satisfy 0 < lower < upper < 100, got lower={lower} upper={upper}");
        }

        let retry_backoff_secs: u64 = parsed_env("RETRY_BACKOFF_SECS", DEFAULT_RETRY_BACKOFF_SECS)?;
        delay_in_range("RETRY_BACKOFF_SECS", retry_backoff_secs)?;
        let boundary_buffer_secs: u64 = parsed_env("BOUNDARY_BUFFER_SECS", DEFAULT_BOUNDARY_BUFFER_SECS)?;
        delay_in_range("BOUNDARY_BUFFER_SECS", boundary_buffer_secs)?;

        Ok(Config {
            symbol,
            interval,
            interval_ms,
            period,
            upper,
            lower,
            retry_backoff: Duration::from_secs(retry_backoff_secs),
            boundary_buffer_ms: (boundary_buffer_secs * 1_000) as i64,
            discord_token,
            discord_channel_id,
            bybit_api_key,
            bybit_api_secret,
        })
    }
}

/// Length of one bar in milliseconds, or `None` for an unsupported code
pub fn interval_to_ms(code: &str) -> Option<i64> {
    if code == "D" {
        return Some(24 * 60 * 60_000);
    }
    if MINUTE_CODES.contains(&code) {
        let minutes: i64 = code.parse().ok()?;
        return Some(minutes * 60_000);
    }
    None
}

/// Backoff doubling and millisecond conversion assume delays within one day
fn delay_in_range(key: &str, secs: u64) -> Result<()> {
    if secs > MAX_DELAY_SECS {
        bail!("{key} must be at most {MAX_DELAY_SECS} seconds, got {secs}");
    }
    Ok(())
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}
