//! URL Runner - reference differer runner.
//!
//! Receives protobuf jobs, parses the job address as a URL and reports its
//! components. Addresses that do not parse come back with the parse error
//! in the result's `error` field rather than as an HTTP failure.

pub mod config;
pub mod error;

use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use differer_common::{codec, decode_job, encode_result, RunResult};
use serde_json::{json, Value};
use url::Url;

use crate::error::{Error, Result};

/// Identifier stamped on every result produced by this runner.
pub const RUNNER_ID: &str = "rust-url";

/// Describe the components of `address`.
pub fn evaluate(address: &str) -> RunResult {
    let url = match Url::parse(address) {
        Ok(url) => url,
        Err(e) => {
            return RunResult {
                id: RUNNER_ID.to_string(),
                value: String::new(),
                error: e.to_string(),
            }
        }
    };

    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };

    let mut value = format!(
        "Scheme={}; Host={}; Path={};",
        url.scheme(),
        host,
        url.path()
    );

    if !url.username().is_empty() || url.password().is_some() {
        let user = match url.password() {
            Some(password) => format!("{}:{}", url.username(), password),
            None => url.username().to_string(),
        };
        value.push_str(&format!(" User={};", user));
    }

    RunResult::ok(RUNNER_ID, value)
}

/// POST / - evaluate one protobuf-encoded job.
async fn handle_job(body: Bytes) -> Result<impl IntoResponse> {
    let job = decode_job(&body).map_err(Error::BadRequest)?;
    tracing::debug!("Evaluating {}", job.address);

    let result = evaluate(&job.address);
    let encoded = encode_result(&result).map_err(Error::Internal)?;

    Ok(([(header::CONTENT_TYPE, codec::CONTENT_TYPE)], encoded))
}

/// GET /health - Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "id": RUNNER_ID }))
}

/// Build the runner's router.
pub fn router() -> Router {
    Router::new()
        .route("/", post(handle_job))
        .route("/health", get(health))
}
