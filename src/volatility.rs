//! Ledger read model: the IV series as stored, alongside realized
//! volatility of the spot column for comparison.

use serde::Serialize;

use crate::classify::Regime;
use crate::ledger::{AVG_IV_COLUMN, data_records};
use crate::model::Symbol;

/// Observations per realized-volatility window.
pub const HV_PERIOD: usize = 20;
const PERIODS_PER_YEAR: f64 = 252.0;

const DATE_COLUMN: usize = 0;
const SPOT_COLUMN: usize = 2;
const PERCENTILE_COLUMN: usize = 9;
const REGIME_COLUMN: usize = 10;

/// Annualized realized volatility (percent, 2 decimals) of log returns over
/// the trailing `period` returns ending at each index.
///
/// The first `period` entries are `None`, as is any window touching a
/// missing or non-positive price.
pub fn historical_volatility(prices: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    (0..prices.len())
        .map(|i| {
            if period == 0 || i < period {
                return None;
            }
            let returns = (i + 1 - period..=i)
                .map(|j| match (prices[j - 1], prices[j]) {
                    (Some(prev), Some(cur)) if prev > 0.0 && cur > 0.0 => Some((cur / prev).ln()),
                    _ => None,
                })
                .collect::<Option<Vec<f64>>>()?;

            let n = returns.len() as f64;
            let mean = returns.iter().sum::<f64>() / n;
            let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
            let annualized = variance.sqrt() * PERIODS_PER_YEAR.sqrt() * 100.0;
            Some((annualized * 100.0).round() / 100.0)
        })
        .collect()
}

/// Column-oriented view of one ledger, ready for charting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSeries {
    pub symbol: Symbol,
    pub dates: Vec<String>,
    pub spot: Vec<Option<f64>>,
    pub avg_iv: Vec<Option<f64>>,
    pub hv: Vec<Option<f64>>,
    pub iv_percentile: Vec<Option<f64>>,
    pub iv_regime: Vec<Option<Regime>>,
}

impl LedgerSeries {
    pub fn from_ledger(symbol: Symbol, text: &str) -> Self {
        let records: Vec<_> = data_records(text)
            .into_iter()
            .filter(|r| r.get(DATE_COLUMN).is_some_and(|d| !d.trim().is_empty()))
            .collect();

        let real = |r: &csv::StringRecord, col: usize| {
            r.get(col)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };

        let spot: Vec<Option<f64>> = records.iter().map(|r| real(r, SPOT_COLUMN)).collect();
        let hv = historical_volatility(&spot, HV_PERIOD);

        LedgerSeries {
            symbol,
            dates: records
                .iter()
                .map(|r| r.get(DATE_COLUMN).unwrap_or_default().to_string())
                .collect(),
            avg_iv: records.iter().map(|r| real(r, AVG_IV_COLUMN)).collect(),
            iv_percentile: records.iter().map(|r| real(r, PERCENTILE_COLUMN)).collect(),
            iv_regime: records
                .iter()
                .map(|r| r.get(REGIME_COLUMN).and_then(Regime::parse))
                .collect(),
            spot,
            hv,
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}
