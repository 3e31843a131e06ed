//! Crypto error types

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    /// Input bytes are not a canonical encoding of a group element or scalar.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(&'static str),

    /// AEAD verification failed. This is a normal negative outcome for a
    /// caller holding the wrong key or associated data, not a fault.
    #[error("ciphertext authentication failed")]
    AuthFailed,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
