//! Server error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use blindfeed_protocol::ErrorBody;
use thiserror::Error;

/// Server result type
pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("dataset already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid dataset name: {0}")]
    InvalidName(String),

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// On-disk state that should be well-formed is not (index, log or key
    /// failed to parse). Operator intervention required.
    #[error("corrupt dataset state: {0}")]
    CorruptState(String),

    #[error("crypto failure: {0}")]
    Crypto(#[from] blindfeed_oprf::CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::UnknownDataset(_) => (StatusCode::NOT_FOUND, "UNKNOWN_DATASET"),
            ServerError::AlreadyExists(_) => (StatusCode::CONFLICT, "ALREADY_EXISTS"),
            ServerError::InvalidName(_) => (StatusCode::BAD_REQUEST, "INVALID_NAME"),
            ServerError::InvalidEncoding(_) => (StatusCode::BAD_REQUEST, "INVALID_ENCODING"),
            ServerError::UnsupportedAlgorithm(_) => {
                (StatusCode::BAD_REQUEST, "UNSUPPORTED_ALGORITHM")
            }
            ServerError::CorruptState(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CORRUPT_STATE"),
            ServerError::Crypto(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CRYPTO_FAILURE"),
            ServerError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorBody {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<blindfeed_protocol::ProtocolError> for ServerError {
    fn from(err: blindfeed_protocol::ProtocolError) -> Self {
        use blindfeed_protocol::ProtocolError;
        match err {
            ProtocolError::InvalidDatasetName(msg) => ServerError::InvalidName(msg),
            other => ServerError::CorruptState(other.to_string()),
        }
    }
}
