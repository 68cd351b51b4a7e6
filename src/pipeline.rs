//! Snapshot → ATM IV → ranked ledger row → committed ledger.
//!
//! A request touches the store exactly twice: one read, then one write
//! carrying the version from that read. Any failure before the write
//! leaves the ledger untouched, and nothing is retried here.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::classify::{Regime, classify};
use crate::ledger::{self, LedgerError, LedgerSchema, LedgerStore, StoreError};
use crate::model::num::round2;
use crate::model::{LedgerRow, OptionChainSnapshot, Symbol, ValidationError};
use crate::select::{select_strike, theoretical_atm};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("ATM strike not found in option chain (theoretical ATM {atm})")]
    NoValidStrike { atm: i64 },

    #[error("cannot average CE IV {ce_iv} and PE IV {pe_iv}")]
    Compute { ce_iv: f64, pe_iv: f64 },

    #[error("ledger for {0} was modified concurrently, retry the request")]
    LedgerConflict(Symbol),

    #[error("ledger for {0} does not exist")]
    LedgerUnavailable(Symbol),

    #[error("ledger storage error: {0}")]
    StorageTransport(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl PipelineError {
    /// Whether the same request may succeed if simply sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::LedgerConflict(_))
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotAvailable(symbol) => PipelineError::LedgerUnavailable(symbol),
            StoreError::Conflict(symbol) => PipelineError::LedgerConflict(symbol),
            StoreError::Transport(msg) => PipelineError::StorageTransport(msg),
        }
    }
}

/// Percentile rank and regime of the new reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IvRanking {
    pub iv_percentile: Option<f64>,
    pub iv_regime: Regime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub date: String,
    pub symbol: Symbol,
    pub spot: f64,
    /// Theoretical ATM from spot and strike step.
    pub atm: i64,
    /// Strike actually used; differs from `atm` when the ATM quote lacked IV.
    pub strike: i64,
    pub ce_iv: f64,
    pub pe_iv: f64,
    pub avg_iv: f64,
    pub ce_oi: i64,
    pub pe_oi: i64,
    #[serde(flatten)]
    pub ranking: Option<IvRanking>,
}

pub struct Pipeline {
    store: Arc<dyn LedgerStore>,
    schema: LedgerSchema,
}

impl Pipeline {
    pub fn new(store: Arc<dyn LedgerStore>, schema: LedgerSchema) -> Self {
        Self { store, schema }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Validate a decoded request body, then [`Pipeline::process`] it.
    pub async fn process_request(&self, body: &Value) -> Result<PipelineOutput, PipelineError> {
        let snapshot = OptionChainSnapshot::from_request(body)?;
        self.process(&snapshot).await
    }

    pub async fn process(
        &self,
        snapshot: &OptionChainSnapshot,
    ) -> Result<PipelineOutput, PipelineError> {
        let symbol = snapshot.symbol;
        let atm = theoretical_atm(snapshot.spot, snapshot.strike_step).ok_or_else(|| {
            ValidationError::InvalidField {
                field: "spot",
                reason: format!(
                    "{} is out of range for strike step {}",
                    snapshot.spot, snapshot.strike_step
                ),
            }
        })?;

        let selected =
            select_strike(&snapshot.chain, atm).ok_or(PipelineError::NoValidStrike { atm })?;
        if selected.strike != atm {
            info!(%symbol, atm, strike = selected.strike, "ATM quote unusable, using nearest valid strike");
        }

        let mean = (selected.ce_iv + selected.pe_iv) / 2.0;
        if !mean.is_finite() {
            return Err(PipelineError::Compute {
                ce_iv: selected.ce_iv,
                pe_iv: selected.pe_iv,
            });
        }
        let avg_iv = round2(mean);

        let current = self.store.read(symbol).await?;

        let ranking = snapshot.classify.then(|| {
            let history = ledger::avg_iv_history(&current.text, &snapshot.date, symbol.as_str());
            let c = classify(&history, avg_iv);
            IvRanking {
                iv_percentile: c.percentile,
                iv_regime: c.regime,
            }
        });

        let row = LedgerRow {
            date: snapshot.date.clone(),
            symbol,
            spot: snapshot.spot,
            strike: selected.strike,
            ce_iv: selected.ce_iv,
            pe_iv: selected.pe_iv,
            avg_iv,
            ce_oi: selected.ce_oi,
            pe_oi: selected.pe_oi,
            iv_percentile: ranking.and_then(|r| r.iv_percentile),
            iv_regime: ranking.map(|r| r.iv_regime),
        };
        let updated = ledger::upsert(&current.text, &row, self.schema)?;

        let message = format!("Add IV data for {symbol} {}", snapshot.date);
        if let Err(e) = self
            .store
            .write(symbol, &updated, &current.version, &message)
            .await
        {
            warn!(%symbol, date = %snapshot.date, store = %self.store.describe(), error = %e, "ledger commit failed");
            return Err(e.into());
        }

        info!(
            %symbol,
            date = %snapshot.date,
            strike = row.strike,
            avg_iv,
            regime = ?row.iv_regime,
            "ledger updated"
        );

        Ok(PipelineOutput {
            date: row.date,
            symbol,
            spot: row.spot,
            atm,
            strike: row.strike,
            ce_iv: row.ce_iv,
            pe_iv: row.pe_iv,
            avg_iv,
            ce_oi: row.ce_oi,
            pe_oi: row.pe_oi,
            ranking,
        })
    }
}
