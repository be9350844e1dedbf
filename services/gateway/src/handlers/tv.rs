//! TradingView UDF endpoints

use axum::{
    Json,
    extract::{Query, State},
    http::header,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::error;
use types::errors::QueryError;

use crate::error::AppError;
use crate::history::HistoryError;
use crate::markets::DEFAULT_PRICE_SCALE;
use crate::models::{SymbolInfo, TvConfig};
use crate::state::AppState;

const STATIC_CACHE: &str = "public, max-age=360";
const HISTORY_CACHE: &str = "public, max-age=1";

pub async fn config() -> impl IntoResponse {
    ([(header::CACHE_CONTROL, STATIC_CACHE)], Json(TvConfig::new()))
}

#[derive(Debug, Deserialize)]
pub struct SymbolParams {
    #[serde(default)]
    pub symbol: String,
}

pub async fn symbols(
    State(state): State<AppState>,
    Query(params): Query<SymbolParams>,
) -> impl IntoResponse {
    let pricescale = state
        .markets
        .by_name(&params.symbol)
        .map(|m| m.config.price_scale())
        .unwrap_or(DEFAULT_PRICE_SCALE);
    (
        [(header::CACHE_CONTROL, STATIC_CACHE)],
        Json(SymbolInfo::new(&params.symbol, pricescale)),
    )
}

/// Raw parameters; parsed here so malformed values get the JSON error body.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub resolution: String,
    pub from: Option<String>,
    pub to: Option<String>,
}

fn parse_seconds(name: &str, raw: Option<&str>) -> Result<i64, AppError> {
    let raw = raw.unwrap_or_default();
    raw.trim().parse().map_err(|_| {
        AppError::Query(QueryError::InvalidParameter {
            name: name.to_string(),
            value: raw.to_string(),
        })
    })
}

pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, AppError> {
    // Unknown series wins over malformed bounds
    state.history.series(&params.symbol, &params.resolution)?;
    let from = parse_seconds("from", params.from.as_deref())?;
    let to = parse_seconds("to", params.to.as_deref())?;

    match state
        .history
        .history(&params.symbol, &params.resolution, from, to)
        .await
    {
        Ok(resp) => Ok(([(header::CACHE_CONTROL, HISTORY_CACHE)], Json(resp))),
        Err(HistoryError::Query(e)) => Err(e.into()),
        Err(e) => {
            error!(symbol = %params.symbol, resolution = %params.resolution, error = %e, "History query failed");
            state.report(format!("tv/history {} {}", params.symbol, e));
            Err(e.into())
        }
    }
}
