//! Error types for the URL runner.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use differer_common::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bad request")]
    BadRequest(#[source] CodecError),

    #[error("internal error")]
    Internal(#[source] CodecError),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::BadRequest(e) => {
                tracing::debug!("Could not decode job: {}", e);
                StatusCode::BAD_REQUEST
            }
            Error::Internal(e) => {
                tracing::error!("Could not encode result: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
