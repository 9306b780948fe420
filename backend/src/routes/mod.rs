pub mod differer;
pub mod health;

use std::sync::Arc;

use axum::Router;

use crate::AppState;

/// All routes served by the gateway.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router(state.clone()))
        .merge(differer::router(state))
}
