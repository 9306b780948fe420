//! Batch endpoint: validate addresses, dispatch, return aggregated results.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ApiError, Result};
use crate::AppState;

/// Maximum number of addresses accepted in one batch.
pub const MAX_INPUT_COUNT: usize = 4096;
/// Maximum length of a single address, in bytes.
pub const MAX_INPUT_LENGTH: usize = 128;

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchRequest {
    /// A missing or `null` list reads as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub addresses: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reject batches the dispatcher should never see.
pub fn validate(addresses: &[String]) -> Result<()> {
    if addresses.is_empty() {
        return Err(ApiError::NoAddresses);
    }

    if addresses.len() > MAX_INPUT_COUNT {
        return Err(ApiError::TooManyAddresses(MAX_INPUT_COUNT));
    }

    for address in addresses {
        if address.is_empty() {
            return Err(ApiError::EmptyAddress);
        }
        if address.len() > MAX_INPUT_LENGTH {
            return Err(ApiError::AddressTooLong(MAX_INPUT_LENGTH));
        }
    }

    Ok(())
}

async fn handle_input(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response> {
    // A bare `null` body carries no addresses rather than a bad schema.
    let addresses = serde_json::from_slice::<Option<BatchRequest>>(&body)
        .map_err(ApiError::BadSchema)?
        .map(|request| request.addresses)
        .unwrap_or_default();
    validate(&addresses)?;

    tracing::info!(
        "Got {} addresses for {} runners. Total tasks is {}",
        addresses.len(),
        state.runners.len(),
        addresses.len() * state.runners.len()
    );

    let cancel = state.shutdown.child_token();

    let output = state
        .dispatcher
        .dispatch(&cancel, &addresses, &state.runners)
        .await?;

    let body = serde_json::to_vec(&output).map_err(ApiError::Serialize)?;

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/differer", post(handle_input))
        .with_state(state)
}
