//! Client error types

use thiserror::Error;

/// Client result type
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("server speaks an unsupported suite: {suite}/{encryption}")]
    UnsupportedSuite { suite: String, encryption: String },

    /// Local mirror or server response disagrees with the hash chain; the
    /// caller falls back to a full resync.
    #[error("inconsistent change log: {0}")]
    Inconsistent(String),

    #[error("malformed server response: {0}")]
    InvalidResponse(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] blindfeed_protocol::ProtocolError),

    #[error("crypto error: {0}")]
    Crypto(#[from] blindfeed_oprf::CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
