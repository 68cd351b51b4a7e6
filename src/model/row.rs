use crate::classify::Regime;

use super::num::format_real;
use super::symbol::Symbol;

/// One persisted ledger line.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub date: String,
    pub symbol: Symbol,
    pub spot: f64,
    pub strike: i64,
    pub ce_iv: f64,
    pub pe_iv: f64,
    pub avg_iv: f64,
    pub ce_oi: i64,
    pub pe_oi: i64,
    pub iv_percentile: Option<f64>,
    pub iv_regime: Option<Regime>,
}

impl LedgerRow {
    /// `(Date, Symbol)` as written in the first two columns.
    pub fn key(&self) -> (&str, &str) {
        (&self.date, self.symbol.as_str())
    }

    /// The nine base columns, in ledger order.
    pub fn base_fields(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.symbol.as_str().to_string(),
            format_real(self.spot),
            self.strike.to_string(),
            format_real(self.ce_iv),
            format_real(self.pe_iv),
            format_real(self.avg_iv),
            self.ce_oi.to_string(),
            self.pe_oi.to_string(),
        ]
    }

    /// `IV_PERCENTILE`, `IV_REGIME`; empty cells when unclassified.
    pub fn regime_fields(&self) -> [String; 2] {
        [
            self.iv_percentile.map(format_real).unwrap_or_default(),
            self.iv_regime.map(|r| r.to_string()).unwrap_or_default(),
        ]
    }
}
