use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use session_series_cell::{session_routes, SessionCellState};
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>) -> Router {
    let sessions = SessionCellState::from_config(config);

    Router::new()
        .route("/", get(|| async { "Physio Clinic API is running!" }))
        .nest("/sessions", session_routes(sessions))
}
