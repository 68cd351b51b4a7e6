//! Percentile rank of the current ATM IV against recent ledger history.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::num::round2;

/// Number of most recent history values a reading is ranked against.
pub const HISTORY_WINDOW: usize = 30;

/// Volatility regime implied by the percentile rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Panic,
    Expansion,
    NormalHigh,
    NormalLow,
    Compression,
    /// No history to rank against.
    #[serde(rename = "NA")]
    Na,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Panic => "PANIC",
            Regime::Expansion => "EXPANSION",
            Regime::NormalHigh => "NORMAL_HIGH",
            Regime::NormalLow => "NORMAL_LOW",
            Regime::Compression => "COMPRESSION",
            Regime::Na => "NA",
        }
    }

    pub fn parse(s: &str) -> Option<Regime> {
        match s.trim() {
            "PANIC" => Some(Regime::Panic),
            "EXPANSION" => Some(Regime::Expansion),
            "NORMAL_HIGH" => Some(Regime::NormalHigh),
            "NORMAL_LOW" => Some(Regime::NormalLow),
            "COMPRESSION" => Some(Regime::Compression),
            "NA" => Some(Regime::Na),
            _ => None,
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub percentile: Option<f64>,
    pub regime: Regime,
}

/// The last `HISTORY_WINDOW` values of `history`.
pub fn trailing_window(history: &[f64]) -> &[f64] {
    &history[history.len().saturating_sub(HISTORY_WINDOW)..]
}

/// Share of `history` at or below `current`, in percent, rounded to two
/// decimals. `None` for an empty history.
pub fn percentile_rank(history: &[f64], current: f64) -> Option<f64> {
    if history.is_empty() {
        return None;
    }
    let at_or_below = history.iter().filter(|h| **h <= current).count();
    Some(round2(at_or_below as f64 * 100.0 / history.len() as f64))
}

pub fn regime_for(percentile: Option<f64>) -> Regime {
    match percentile {
        None => Regime::Na,
        Some(p) if p >= 95.0 => Regime::Panic,
        Some(p) if p >= 80.0 => Regime::Expansion,
        Some(p) if p >= 50.0 => Regime::NormalHigh,
        Some(p) if p >= 20.0 => Regime::NormalLow,
        Some(_) => Regime::Compression,
    }
}

/// Rank `current` against the trailing window of `history` (oldest first).
pub fn classify(history: &[f64], current: f64) -> Classification {
    let percentile = percentile_rank(trailing_window(history), current);
    Classification {
        percentile,
        regime: regime_for(percentile),
    }
}
