use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::ledger::StoreError;
use crate::pipeline::PipelineError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// No usable strike; echoes the theoretical ATM that was searched around.
    NoValidStrike { atm: i64, message: String },
    /// Lost a compare-and-swap race on the ledger. Safe to resend.
    Conflict(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::NoValidStrike { atm, message } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "atm": atm }),
            ),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                json!({ "error": msg, "retryable": true }),
            ),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, json!({ "error": msg })),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg })),
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::Validation(_) | PipelineError::Compute { .. } => ApiError::BadRequest(message),
            PipelineError::NoValidStrike { atm } => ApiError::NoValidStrike { atm, message },
            PipelineError::LedgerConflict(_) => ApiError::Conflict(message),
            PipelineError::LedgerUnavailable(_) => ApiError::NotFound(message),
            PipelineError::StorageTransport(_) => ApiError::BadGateway(message),
            PipelineError::Ledger(_) => ApiError::Internal(message),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        PipelineError::from(err).into()
    }
}
