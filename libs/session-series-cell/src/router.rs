// libs/session-series-cell/src/router.rs
use axum::{
    Router,
    routing::{get, post, put},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, SessionCellState};

pub fn session_routes(state: SessionCellState) -> Router {
    // Every session operation requires an authenticated clinic user
    Router::new()
        .route("/create-series", post(handlers::create_series))
        .route("/search", get(handlers::search_sessions))
        .route("/reschedule/{session_id}", put(handlers::reschedule_session))
        .route("/cancel/{session_id}", put(handlers::cancel_session))
        .route("/cancel-series/{session_id}", put(handlers::cancel_series))
        .route("/{session_id}", get(handlers::get_session).put(handlers::update_session))
        .route("/{session_id}/series", get(handlers::get_series).delete(handlers::delete_series))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
