//! Change-log hash chain
//!
//! Each record extends a cumulative SHA-512 chain:
//!
//! ```text
//! chain_i = SHA-512(chain_{i-1} ‖ "|" ‖ EVENT ‖ "|" ‖ PRF_FIELD ‖ "|" ‖ ENC_META_FIELD)
//! ```
//!
//! with a 64-zero-byte seed before the first record. The hashed fields are
//! the ASCII tokens of the log line, so `-` placeholders are covered too.
//! Readers observing the same chain hash have observed the same prefix.

use sha2::{Digest, Sha512};

use crate::error::{ProtocolError, Result};
use crate::record::{ChainHash, ChangeRecord, EncMeta, EventKind, Prf};

const SEPARATOR: &[u8] = b"|";

/// Incrementally extends the chain while appending records.
pub struct ChainHasher {
    prev: ChainHash,
}

impl ChainHasher {
    /// Start a new chain from the zero seed.
    pub fn new() -> Self {
        Self {
            prev: ChainHash::zero(),
        }
    }

    /// Continue a chain from a known tip.
    pub fn from_tip(tip: ChainHash) -> Self {
        Self { prev: tip }
    }

    /// Current tip.
    pub fn tip(&self) -> ChainHash {
        self.prev
    }

    /// Build the next record, advancing the chain.
    pub fn push(
        &mut self,
        kind: EventKind,
        prf: Option<Prf>,
        enc_meta: Option<EncMeta>,
    ) -> ChangeRecord {
        let mut record = ChangeRecord {
            kind,
            prf,
            enc_meta,
            chain: self.prev,
        };
        record.chain = next_hash(&self.prev, &record);
        self.prev = record.chain;
        record
    }
}

impl Default for ChainHasher {
    fn default() -> Self {
        Self::new()
    }
}

fn next_hash(prev: &ChainHash, record: &ChangeRecord) -> ChainHash {
    let mut hasher = Sha512::new();
    hasher.update(prev.0);
    hasher.update(SEPARATOR);
    hasher.update(record.kind.as_str().as_bytes());
    hasher.update(SEPARATOR);
    hasher.update(record.prf_field().as_bytes());
    hasher.update(SEPARATOR);
    hasher.update(record.enc_meta_field().as_bytes());
    let mut out = [0u8; 64];
    out.copy_from_slice(&hasher.finalize());
    ChainHash(out)
}

/// Verify that `records` form a valid chain continuation of `seed`.
///
/// Returns the index of the first record whose stored chain hash does not
/// match the recomputation.
pub fn verify_chain(seed: ChainHash, records: &[ChangeRecord]) -> Result<()> {
    let mut prev = seed;
    for (index, record) in records.iter().enumerate() {
        let expected = next_hash(&prev, record);
        if record.chain != expected {
            return Err(ProtocolError::ChainMismatch { index });
        }
        prev = record.chain;
    }
    Ok(())
}
