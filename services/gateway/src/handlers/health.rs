use axum::{Json, extract::State};
use market_data::SERVICE_VERSION;

use crate::models::HealthResponse;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: SERVICE_VERSION.to_string(),
        backend: state.history.store().backend_name().to_string(),
        markets: state.markets.len(),
        collecting: state.collecting,
        metrics: state.metrics.export(),
    })
}
