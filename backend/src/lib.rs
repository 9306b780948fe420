//! Differer gateway.
//!
//! Accepts batches of addresses over HTTP, evaluates each address with every
//! configured runner, and answers with one JSON document holding every
//! (runner, address) outcome.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod routes;
pub mod runner;
pub mod test_util;

pub use crate::config::{ApiConfig, Config, ConfigError, DispatchConfig, LoggingConfig};
pub use dispatch::{AddressResult, DispatchError, DispatchOutput, Dispatcher};
pub use error::ApiError;
pub use runner::{HttpRunner, Runner, RunnerError};

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{middleware, Router};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Largest accepted request body. A full batch of maximum-length addresses
/// with heavy JSON escaping still fits.
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Shared application state.
pub struct AppState {
    /// Runners every address is sent to, ordered by name.
    pub runners: Vec<Arc<dyn Runner>>,
    pub dispatcher: Dispatcher,
    /// Cancelled when the server starts shutting down. Batches still in
    /// flight then finish promptly with absent outputs.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: &Config, runners: Vec<Arc<dyn Runner>>) -> Self {
        Self {
            runners,
            dispatcher: Dispatcher::new(&config.dispatch),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Build the full application: routes plus logging and body-size layers.
pub fn app(state: Arc<AppState>) -> Router {
    routes::router(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(logging::request_logger))
        .layer(TraceLayer::new_for_http())
}
