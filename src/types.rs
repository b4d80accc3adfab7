// Shared types for the alert bot

use anyhow::Result;

/// One price bar (kline) for a fixed interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub open_time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Sanity check on a parsed bar. Rejects inconsistent OHLC
    /// relationships, negative volume, and non-finite values.
    pub fn is_well_formed(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= 0.0
    }
}

/// Classification of an RSI score against the configured thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Overbought,
    Oversold,
    Neutral,
}

impl Signal {
    pub fn label(&self) -> &'static str {
        match self {
            Signal::Overbought => "Overbought",
            Signal::Oversold => "Oversold",
            Signal::Neutral => "Neutral",
        }
    }
}

/// A threshold crossing detected on the most recent closed bar.
/// Created when a crossing is found, never persisted.
#[derive(Debug, Clone)]
pub struct Alert {
    pub signal: Signal,
    pub score: f64,
    pub symbol: String,
    pub interval: String,
    pub at_ms: i64,
}

impl Alert {
    /// Message text delivered to the notification channel
    pub fn message(&self) -> String {
        format!(
            "RSI Alert: {}! {} {} RSI is {:.2}",
            self.signal.label(),
            self.symbol,
            self.interval_label(),
            self.score
        )
    }

    fn interval_label(&self) -> String {
        if self.interval == "D" {
            "1d".to_string()
        } else {
            format!("{}m", self.interval)
        }
    }
}

/// Source of recent price bars for a symbol/interval.
///
/// Implementations normalize bars to oldest-first order; any failure
/// (network, rate limit, malformed response) collapses to an `Err` and is
/// treated as "no data this attempt" by the caller.
pub trait BarSource {
    async fn fetch_bars(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Bar>>;
}

/// Delivery of a text message to the destination channel
pub trait Notifier {
    async fn send(&self, text: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            open_time_ms: 1_700_000_000_000,
            open,
            high,
            low,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn test_well_formed_accepts_ordinary_bars() {
        assert!(bar(58.0, 58.4, 57.9, 58.2).is_well_formed());
        assert!(bar(58.0, 58.0, 58.0, 58.0).is_well_formed());
    }

    #[test]
    fn test_well_formed_rejects_inconsistent_prices() {
        assert!(!bar(58.0, 57.0, 58.4, 58.2).is_well_formed()); // high below low
        assert!(!bar(59.0, 58.4, 57.9, 58.2).is_well_formed()); // open above high
        assert!(!bar(58.0, 58.4, 57.9, 57.0).is_well_formed()); // close below low
        assert!(!bar(f64::NAN, 58.4, 57.9, 58.2).is_well_formed());
    }

    #[test]
    fn test_well_formed_rejects_negative_volume() {
        let mut b = bar(58.0, 58.4, 57.9, 58.2);
        b.volume = -1.0;
        assert!(!b.is_well_formed());
    }

    #[test]
    fn test_alert_message_format() {
        let alert = Alert {
            signal: Signal::Overbought,
            score: 71.234,
            symbol: "SOLUSDT".to_string(),
            interval: "60".to_string(),
            at_ms: 1_700_000_000_000,
        };
        assert_eq!(alert.message(), "RSI Alert: Overbought! SOLUSDT 60m RSI is 71.23");

        let daily = Alert {
            interval: "D".to_string(),
            signal: Signal::Oversold,
            ..alert
        };
        assert_eq!(daily.message(), "RSI Alert: Oversold! SOLUSDT 1d RSI is 71.23");
    }
}
