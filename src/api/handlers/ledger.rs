use axum::Json;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use tracing::debug;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::model::Symbol;
use crate::volatility::LedgerSeries;

fn parse_symbol(raw: &str) -> Result<Symbol, ApiError> {
    raw.parse().map_err(|e: crate::model::symbol::UnknownSymbol| ApiError::NotFound(e.to_string()))
}

/// Dates, IV, HV and regime columns of one ledger.
pub async fn get_series(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<LedgerSeries>, ApiError> {
    let symbol = parse_symbol(&symbol)?;

    let generation = {
        let mut cache = state.inner.series_cache.lock().await;
        if let Some(series) = cache.get(&symbol) {
            debug!(%symbol, "series cache hit");
            return Ok(Json(series));
        }
        cache.generation(&symbol)
    };

    let snapshot = state.store().read(symbol).await?;
    let series = LedgerSeries::from_ledger(symbol, &snapshot.text);
    let cached = state
        .inner
        .series_cache
        .lock()
        .await
        .insert_if_generation(symbol, series.clone(), generation);
    if !cached {
        debug!(%symbol, "ledger committed during read, series not cached");
    }

    Ok(Json(series))
}

/// The ledger file as stored, for download.
pub async fn get_csv(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let symbol = parse_symbol(&symbol)?;
    let snapshot = state.store().read(symbol).await?;
    let disposition = format!("attachment; filename=\"{}\"", symbol.ledger_file());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        snapshot.text,
    ))
}
