use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::num::{parse_integer, parse_real};

/// A chain entry exactly as received. Every field may be missing, null, a
/// number, or a string; nothing is interpreted until [`try_parse_quote`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuote {
    #[serde(default)]
    pub strike: Option<Value>,
    #[serde(default)]
    pub ce_iv: Option<Value>,
    #[serde(default)]
    pub pe_iv: Option<Value>,
    #[serde(default)]
    pub ce_oi: Option<Value>,
    #[serde(default)]
    pub pe_oi: Option<Value>,
}

impl RawQuote {
    /// Build from an arbitrary JSON chain element. Non-object elements
    /// become an empty quote, which is later skipped for lack of a strike.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

/// A typed quote. IVs that were absent or unparsable are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct StrikeQuote {
    pub strike: i64,
    pub ce_iv: Option<f64>,
    pub pe_iv: Option<f64>,
    pub ce_oi: i64,
    pub pe_oi: i64,
}

impl StrikeQuote {
    /// Narrow to a selectable row; only quotes with both legs' IV qualify.
    pub fn as_candidate(&self) -> Option<SelectedStrikeRow> {
        Some(SelectedStrikeRow {
            strike: self.strike,
            ce_iv: self.ce_iv?,
            pe_iv: self.pe_iv?,
            ce_oi: self.ce_oi,
            pe_oi: self.pe_oi,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingStrike,
    InvalidStrike,
    InvalidOpenInterest,
}

/// Outcome of parsing one chain entry.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteParse {
    Quote(StrikeQuote),
    Skip(SkipReason),
}

/// Convert a raw entry into a typed quote.
///
/// Strikes accept any real (truncated to an integer). Missing, null or
/// unparsable IVs become `None`. OI defaults to 0 when absent or null, but
/// a present OI that is not an integer skips the entry.
pub fn try_parse_quote(raw: &RawQuote) -> QuoteParse {
    let strike = match raw.strike.as_ref().filter(|v| !v.is_null()) {
        None => return QuoteParse::Skip(SkipReason::MissingStrike),
        Some(v) => match parse_real(v) {
            Some(x) => x.trunc() as i64,
            None => return QuoteParse::Skip(SkipReason::InvalidStrike),
        },
    };

    let (Some(ce_oi), Some(pe_oi)) = (open_interest(&raw.ce_oi), open_interest(&raw.pe_oi)) else {
        return QuoteParse::Skip(SkipReason::InvalidOpenInterest);
    };

    QuoteParse::Quote(StrikeQuote {
        strike,
        ce_iv: raw.ce_iv.as_ref().and_then(parse_real),
        pe_iv: raw.pe_iv.as_ref().and_then(parse_real),
        ce_oi,
        pe_oi,
    })
}

fn open_interest(field: &Option<Value>) -> Option<i64> {
    match field {
        None | Some(Value::Null) => Some(0),
        Some(v) => parse_integer(v),
    }
}

/// The quote chosen to represent ATM volatility.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedStrikeRow {
    pub strike: i64,
    pub ce_iv: f64,
    pub pe_iv: f64,
    pub ce_oi: i64,
    pub pe_oi: i64,
}
