//! Blindfeed server
//!
//! Owns the canonical per-dataset state (private key, `index.csv`,
//! `changes.log`), executes the build/sync/rekey transitions, and exposes
//! the OPRF-evaluation and change-log endpoints over HTTP.
//!
//! The server never stores metadata plaintext and never publishes raw
//! indicators: the change log carries only PRFs and ciphertexts.

mod config;
mod dataset;
mod error;
mod index;
mod source;
mod state;
mod storage;

pub mod routes;

pub use config::ServerConfig;
pub use dataset::{DatasetSchema, DatasetStore, SyncSummary, ALGORITHM_CLASSIC};
pub use error::{Result, ServerError};
pub use index::IndexEntry;
pub use source::read_source_file;
pub use state::AppState;
pub use storage::Storage;
