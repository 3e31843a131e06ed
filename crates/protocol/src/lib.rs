//! Blindfeed protocol crate
//!
//! The shared envelope between server and client: change-log line format,
//! the SHA-512 hash chain over it, dataset-name validation and the JSON
//! bodies of the HTTP endpoints. Group elements, PRFs and chain hashes are
//! fixed-size byte arrays internally; hex is applied only when a value
//! crosses onto a wire or into a file.

mod chain;
mod error;
mod messages;
mod name;
mod record;

pub use chain::{verify_chain, ChainHasher};
pub use error::{ProtocolError, Result};
pub use messages::{
    EncryptionInfo, ErrorBody, EvaluateRequest, EvaluateResponse, SyncMode, ENCRYPTION_NAME,
    SUITE_NAME, SYNC_MODE_HEADER,
};
pub use name::validate_dataset_name;
pub use record::{ChainHash, ChangeRecord, EncMeta, EventKind, Prf, CHAIN_HASH_LEN, PRF_LEN};
