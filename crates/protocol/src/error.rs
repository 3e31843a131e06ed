//! Protocol error types

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid hex in {field}: {detail}")]
    InvalidHex {
        field: &'static str,
        detail: String,
    },

    #[error("malformed change record: {0}")]
    MalformedRecord(String),

    #[error("unknown event kind: {0:?}")]
    UnknownEventKind(String),

    #[error("invalid dataset name: {0}")]
    InvalidDatasetName(String),

    #[error("chain hash mismatch at record {index}")]
    ChainMismatch { index: usize },

    #[error("unknown sync mode: {0:?}")]
    UnknownSyncMode(String),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
