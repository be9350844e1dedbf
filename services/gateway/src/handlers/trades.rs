use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use tracing::error;

use crate::error::AppError;
use crate::history::HistoryError;
use crate::state::AppState;

const TRADES_CACHE: &str = "public, max-age=5";

pub async fn recent_trades(
    State(state): State<AppState>,
    Path(market_pk): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    match state.history.recent_trades(&market_pk).await {
        Ok(resp) => Ok(([(header::CACHE_CONTROL, TRADES_CACHE)], Json(resp))),
        Err(HistoryError::Query(e)) => Err(e.into()),
        Err(e) => {
            error!(market_pk = %market_pk, error = %e, "Recent trades query failed");
            state.report(format!("trades {} {}", market_pk, e));
            Err(e.into())
        }
    }
}
