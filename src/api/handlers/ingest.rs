use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde_json::Value;
use tracing::warn;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::api::types::ProcessResponse;

pub async fn process_option_chain(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        warn!(status = %rejection.status(), "unreadable request body");
        ApiError::BadRequest(rejection.body_text())
    })?;

    let output = match state.inner.pipeline.process_request(&body).await {
        Ok(output) => output,
        Err(e) => {
            warn!(error = %e, retryable = e.is_retryable(), "option chain rejected");
            return Err(e.into());
        }
    };

    state.inner.series_cache.lock().await.invalidate(&output.symbol);

    Ok(Json(ProcessResponse {
        status: "success",
        data: output,
    }))
}
