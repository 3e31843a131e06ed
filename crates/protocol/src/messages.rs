//! HTTP message bodies and the sync-mode indicator

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Cipher-suite identifier advertised by `/encryption_type`.
pub const SUITE_NAME: &str = "oprf-ristretto255-sha512";

/// Metadata encryption identifier advertised by `/encryption_type`.
pub const ENCRYPTION_NAME: &str = "xchacha20poly1305-ietf";

/// Response header carrying the sync mode of a `/sync_data` response.
pub const SYNC_MODE_HEADER: &str = "x-sync-mode";

/// Body of `POST /oprf_evaluate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub data_type: String,
    /// Hex of the 32-byte blinded group element.
    pub blinded: String,
}

/// Response of `POST /oprf_evaluate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateResponse {
    /// Hex of the 32-byte evaluated group element.
    pub evaluated: String,
}

/// Response of `GET /encryption_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionInfo {
    pub data_type: String,
    pub suite: String,
    pub encryption: String,
}

impl EncryptionInfo {
    pub fn current(data_type: &str) -> Self {
        Self {
            data_type: data_type.to_string(),
            suite: SUITE_NAME.to_string(),
            encryption: ENCRYPTION_NAME.to_string(),
        }
    }

    /// Whether a server's advertisement matches the suite this client speaks.
    pub fn is_supported(&self) -> bool {
        self.suite == SUITE_NAME && self.encryption == ENCRYPTION_NAME
    }
}

/// Error envelope returned by the server on any non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

/// Whether a `/sync_data` response replaces or extends the client's log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Full,
    Delta,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Delta => "delta",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(SyncMode::Full),
            "delta" => Ok(SyncMode::Delta),
            other => Err(ProtocolError::UnknownSyncMode(other.to_string())),
        }
    }
}
