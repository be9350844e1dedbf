use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use types::errors::QueryError;

use crate::history::HistoryError;

/// Central error type for the HTTP handlers
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<HistoryError> for AppError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::Query(e) => AppError::Query(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Query(QueryError::UnknownSeries {
                valid_symbol,
                valid_resolution,
                ..
            }) => (
                StatusCode::NOT_FOUND,
                json!({
                    "s": "error",
                    "validSymbol": valid_symbol,
                    "validResolution": valid_resolution,
                }),
            ),
            AppError::Query(QueryError::UnknownMarket { .. }) => (
                StatusCode::NOT_FOUND,
                json!({ "s": "error", "validPk": false }),
            ),
            AppError::Query(err) => (
                StatusCode::BAD_REQUEST,
                json!({ "s": "error", "errmsg": err.to_string() }),
            ),
            // Details go to the notifier, not the client
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "s": "error" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
