//! HTTP routes

mod health;
mod oprf;
mod sync;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/sync_data", get(sync::sync_data))
        .route("/encryption_type", get(sync::encryption_type))
        .route("/oprf_evaluate", post(oprf::oprf_evaluate))
        .with_state(state)
}
