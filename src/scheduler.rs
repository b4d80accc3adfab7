//! Alert scheduling module
//!
//! Drives the once-per-bar cycle: fetch klines (retrying until data
//! arrives), evaluate RSI over the closed-bar window, alert on threshold
//! crossings, and sleep until just past the next bar boundary.

use std::time::Duration;

use chrono::Utc;

use crate::config::Config;
use crate::rsi::rsi;
use crate::types::{Alert, Bar, BarSource, Notifier, Signal};

/// Send a degraded-health warning after this many consecutive fetch failures
const ESCALATE_AFTER: u32 = 5;
/// Cap the retry backoff at base * 2^6 = 64x
const MAX_BACKOFF_DOUBLINGS: u32 = 6;

/// Classify an RSI score against the configured bounds.
/// Scores exactly on a threshold are Neutral.
pub fn classify(score: f64, upper: f64, lower: f64) -> Signal {
    if score > upper {
        Signal::Overbought
    } else if score < lower {
        Signal::Oversold
    } else {
        Signal::Neutral
    }
}

/// Time to sleep so the next cycle runs just past the next bar boundary.
///
/// Boundaries are integer multiples of the interval on the epoch timeline;
/// the buffer gives the exchange time to publish the closed bar. Recomputed
/// from the wall clock every cycle, so slow cycles cannot drift the
/// schedule.
pub fn sleep_until_next_bar(now_ms: i64, interval_ms: i64, buffer_ms: i64) -> Duration {
    let next_boundary_ms = (now_ms / interval_ms + 1) * interval_ms;
    let sleep_ms = next_boundary_ms + buffer_ms - now_ms;
    Duration::from_millis(sleep_ms.max(0) as u64)
}

/// Closing prices of bars that have already closed. The newest row from the
/// exchange is normally the in-progress bar and must not be evaluated.
fn closed_closes(bars: &[Bar], interval_ms: i64, now_ms: i64) -> Vec<f64> {
    bars.iter()
        .filter(|bar| bar.open_time_ms + interval_ms <= now_ms)
        .map(|bar| bar.close)
        .collect()
}

/// The alert loop. Owns all schedule state: symbol, interval, thresholds,
/// the retry counter, and the previous classification used for crossing
/// detection.
pub struct AlertScheduler {
    symbol: String,
    interval: String,
    interval_ms: i64,
    period: usize,
    upper: f64,
    lower: f64,
    retry_backoff: Duration,
    buffer_ms: i64,
    next_wake_ms: i64,
    last_signal: Signal,
    consecutive_failures: u32,
}

impl AlertScheduler {
    pub fn new(config: &Config) -> Self {
        Self {
            symbol: config.symbol.clone(),
            interval: config.interval.clone(),
            interval_ms: config.interval_ms,
            period: config.period,
            upper: config.upper,
            lower: config.lower,
            retry_backoff: config.retry_backoff,
            buffer_ms: config.boundary_buffer_ms,
            next_wake_ms: 0,
            last_signal: Signal::Neutral,
            consecutive_failures: 0,
        }
    }

    /// Run forever, one evaluation per closed bar. The first cycle runs
    /// immediately; the caller races this future against shutdown.
    pub async fn run(&mut self, source: &impl BarSource, notifier: &impl Notifier) {
        println!(
            "Starting alert loop for {} ({} interval, period {})...",
            self.symbol, self.interval, self.period
        );
        loop {
            self.run_cycle(source, notifier).await;

            let now_ms = Utc::now().timestamp_millis();
            let sleep = sleep_until_next_bar(now_ms, self.interval_ms, self.buffer_ms);
            self.next_wake_ms = now_ms + sleep.as_millis() as i64;
            println!(
                "[SCHED] Next check in {}s (wake at {})",
                sleep.as_secs(),
                self.next_wake_ms
            );
            tokio::time::sleep(sleep).await;
        }
    }

    /// One full cycle: fetch, evaluate the closed-bar window, alert on a
    /// crossing into a zone.
    async fn run_cycle(&mut self, source: &impl BarSource, notifier: &impl Notifier) {
        let bars = self.fetch_with_retry(source, notifier).await;

        let now_ms = Utc::now().timestamp_millis();
        let closes = closed_closes(&bars, self.interval_ms, now_ms);
        let window_start = closes.len().saturating_sub(self.period + 1);
        let Some(score) = rsi(&closes[window_start..], self.period) else {
            println!(
                "[SCHED] Only {} closed bars for period {}, skipping this cycle",
                closes.len(),
                self.period
            );
            return;
        };

        println!("[SCHED] {} closes: {:?}", self.symbol, closes);
        let signal = classify(score, self.upper, self.lower);
        println!("[SCHED] {} RSI: {:.2} ({})", self.symbol, score, signal.label());

        // Alert only when entering a zone; staying inside one stays quiet,
        // and passing through Neutral re-arms both zones.
        let crossed = signal != Signal::Neutral && signal != self.last_signal;
        self.last_signal = signal;
        if !crossed {
            return;
        }

        let alert = Alert {
            signal,
            score,
            symbol: self.symbol.clone(),
            interval: self.interval.clone(),
            at_ms: now_ms,
        };
        println!("[ALERT] {} (ts {})", alert.message(), alert.at_ms);
        if let Err(e) = notifier.send(&alert.message()).await {
            eprintln!("⚠️ Alert dispatch failed, message dropped: {e:#}");
        }
    }

    /// Fetch bars, retrying until the source answers. Backoff doubles with
    /// each consecutive failure up to the cap; after ESCALATE_AFTER failures
    /// a single health warning goes to the notification channel.
    async fn fetch_with_retry(
        &mut self,
        source: &impl BarSource,
        notifier: &impl Notifier,
    ) -> Vec<Bar> {
        // window + 1 closed bars plus the in-progress bar
        let limit = self.period + 2;
        loop {
            match source.fetch_bars(&self.symbol, &self.interval, limit).await {
                Ok(bars) => {
                    if self.consecutive_failures >= ESCALATE_AFTER {
                        println!(
                            "✅ Kline fetch recovered after {} consecutive failures",
                            self.consecutive_failures
                        );
                    }
                    self.consecutive_failures = 0;
                    return bars;
                }
                Err(e) => {
                    self.consecutive_failures += 1;
                    let backoff = self.backoff_delay();
                    eprintln!(
                        "⚠️ Kline fetch failed ({} in a row), retrying in {:?}: {e:#}",
                        self.consecutive_failures, backoff
                    );
                    if self.consecutive_failures == ESCALATE_AFTER {
                        let warning = format!(
                            "Health warning: {} kline fetch has failed {} times in a row; still retrying.",
                            self.symbol, ESCALATE_AFTER
                        );
                        if let Err(send_err) = notifier.send(&warning).await {
                            eprintln!("⚠️ Could not deliver health warning: {send_err:#}");
                        }
                    }
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// base * 2^(failures - 1), capped at 64x the base
    fn backoff_delay(&self) -> Duration {
        let doublings = (self.consecutive_failures - 1).min(MAX_BACKOFF_DOUBLINGS);
        self.retry_backoff * 2u32.pow(doublings)
    }
}
