use crate::handlers::{health, trades, tv};
use crate::state::AppState;
use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let tv_routes = Router::new()
        .route("/config", get(tv::config))
        .route("/symbols", get(tv::symbols))
        .route("/history", get(tv::history));

    Router::new()
        .nest("/tv", tv_routes)
        .route("/trades/address/{market_pk}", get(trades::recent_trades))
        .route("/health", get(health::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
