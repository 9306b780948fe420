//! Errors returned by the HTTP front door.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::dispatch::DispatchError;

/// Request-level failures.
///
/// Validation failures answer 400 with a short plain-text reason. Internal
/// failures answer 500 with a generic message; the cause is only logged.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad schema")]
    BadSchema(#[source] serde_json::Error),

    #[error("No addresses were received")]
    NoAddresses,

    #[error("Only {0} addresses can be passed at once")]
    TooManyAddresses(usize),

    #[error("Empty addresses are not allowed")]
    EmptyAddress,

    #[error("Max supported address length is {0}")]
    AddressTooLong(usize),

    #[error("Something went wrong internally.")]
    Dispatch(#[from] DispatchError),

    #[error("Something went wrong internally.")]
    Serialize(#[source] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadSchema(_)
            | ApiError::NoAddresses
            | ApiError::TooManyAddresses(_)
            | ApiError::EmptyAddress
            | ApiError::AddressTooLong(_) => StatusCode::BAD_REQUEST,
            ApiError::Dispatch(_) | ApiError::Serialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Dispatch(e) => tracing::error!("Could not dispatch batch: {}", e),
            ApiError::Serialize(e) => tracing::error!("Could not marshal results: {}", e),
            ApiError::BadSchema(e) => tracing::debug!("Rejected request body: {}", e),
            _ => tracing::debug!("Rejected batch: {}", self),
        }

        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
