//! Dataset state engine
//!
//! Executes the build/sync/rekey transitions over the canonical index and
//! the append-only change log, under a per-dataset reader/writer lock:
//! writers (`create`, `remove`, `purge`, `sync_from_source`, `rekey`) are
//! exclusive, OPRF evaluation and log reads are shared.
//!
//! Two invariants are maintained at every quiescent point:
//!
//! - the multiset of ADDED-minus-REMOVED PRFs in `changes.log` equals the
//!   PRF set in `index.csv`;
//! - replaying `changes.log` from the zero seed reproduces every stored
//!   chain hash.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use blindfeed_oprf::{self as crypto, CryptoError, PrivateKey};
use blindfeed_protocol::{
    validate_dataset_name, ChainHash, ChainHasher, ChangeRecord, EncMeta, EventKind, Prf, SyncMode,
};

use crate::error::{Result, ServerError};
use crate::index::{encode_index, parse_index, IndexEntry};
use crate::storage::Storage;

/// The only supported algorithm tag.
pub const ALGORITHM_CLASSIC: &str = "classic";

/// Documented placeholder tag; every operation rejects it.
const ALGORITHM_OT: &str = "ot";

/// Per-dataset schema, persisted as `schema.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub data_name: String,
    pub supported_algorithm: String,
    /// Informational rotation hint, e.g. "30d". Not enforced by the engine.
    pub rekey_interval: String,
}

/// Outcome of a sync or rekey transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncSummary {
    pub added: usize,
    pub removed: usize,
}

/// Owns every dataset under one storage root.
pub struct DatasetStore {
    storage: Storage,
    locks: DashMap<String, Arc<RwLock<()>>>,
}

impl DatasetStore {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            locks: DashMap::new(),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn lock(&self, name: &str) -> Arc<RwLock<()>> {
        self.locks
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Initialize schema and private key. Fails if the dataset exists.
    pub fn create_dataset(&self, name: &str, algorithm: &str, rekey_interval: &str) -> Result<()> {
        validate_dataset_name(name)?;
        check_algorithm(algorithm)?;

        let lock = self.lock(name);
        let _guard = lock.write();

        if self.storage.schema_path(name).exists() || self.storage.key_path(name).exists() {
            return Err(ServerError::AlreadyExists(name.to_string()));
        }

        self.storage.ensure_dataset_dir(name)?;

        let schema = DatasetSchema {
            data_name: name.to_string(),
            supported_algorithm: algorithm.to_string(),
            rekey_interval: rekey_interval.to_string(),
        };
        let schema_json = serde_json::to_vec_pretty(&schema)
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        self.storage
            .atomic_write(&self.storage.schema_path(name), &schema_json)?;

        let key = PrivateKey::generate();
        self.storage
            .atomic_write_secret(&self.storage.key_path(name), &key.to_bytes())?;

        tracing::info!(dataset = name, "created dataset");
        Ok(())
    }

    /// Delete schema and key only; index and log are left in place.
    pub fn remove_dataset(&self, name: &str) -> Result<()> {
        validate_dataset_name(name)?;
        let lock = self.lock(name);
        let _guard = lock.write();

        let schema_path = self.storage.schema_path(name);
        let key_path = self.storage.key_path(name);
        if !schema_path.exists() && !key_path.exists() {
            return Err(ServerError::UnknownDataset(name.to_string()));
        }
        if schema_path.exists() {
            fs::remove_file(&schema_path)?;
        }
        if key_path.exists() {
            fs::remove_file(&key_path)?;
        }

        tracing::info!(dataset = name, "removed dataset schema and key");
        Ok(())
    }

    /// Delete the entire dataset directory, data included.
    pub fn purge_dataset(&self, name: &str) -> Result<()> {
        validate_dataset_name(name)?;
        let lock = self.lock(name);
        let _guard = lock.write();

        let dir = self.storage.dataset_dir(name);
        if !dir.exists() {
            return Err(ServerError::UnknownDataset(name.to_string()));
        }
        fs::remove_dir_all(&dir)?;

        tracing::info!(dataset = name, "purged dataset");
        Ok(())
    }

    /// Recompute the target index from `source`, diff it against the current
    /// index, and append the diff to the change log. Re-running with an
    /// identical source appends nothing.
    pub fn sync_from_source<I>(&self, name: &str, source: I) -> Result<SyncSummary>
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        validate_dataset_name(name)?;
        let lock = self.lock(name);
        let _guard = lock.write();

        self.load_schema_locked(name)?;
        let key = self.load_key_locked(name)?;

        let old_entries = self.load_index_locked(name)?;
        let old_map: BTreeMap<&str, &IndexEntry> = old_entries
            .iter()
            .map(|entry| (entry.ioc.as_str(), entry))
            .collect();

        // Later duplicates win; BTreeMap gives the deterministic IOC order
        // that makes two syncs of identical source produce identical chains.
        let mut desired: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for (ioc, meta) in source {
            desired.insert(ioc, meta);
        }

        let mut new_entries = Vec::with_capacity(desired.len());
        let mut added = Vec::new();
        for (ioc, meta) in &desired {
            match old_map.get(ioc.as_str()) {
                Some(existing) if self.entry_unchanged(name, &key, existing, meta) => {
                    new_entries.push((*existing).clone());
                }
                _ => {
                    let entry = encrypt_entry(&key, name, ioc, meta);
                    new_entries.push(entry.clone());
                    added.push(entry);
                }
            }
        }

        let mut removed: Vec<&IndexEntry> = old_entries
            .iter()
            .filter(|entry| !desired.contains_key(entry.ioc.as_str()))
            .collect();
        removed.sort_by(|a, b| a.ioc.cmp(&b.ioc));

        if added.is_empty() && removed.is_empty() {
            tracing::debug!(dataset = name, "sync produced no changes");
            return Ok(SyncSummary::default());
        }

        let log_body = self.load_log_body_locked(name)?;
        let records = parse_log_body(&log_body)?;
        let mut hasher = ChainHasher::from_tip(log_tip(&records));

        let mut log_lines = String::new();
        for entry in &added {
            let record = hasher.push(
                EventKind::Added,
                Some(entry.prf),
                Some(entry.enc_meta.clone()),
            );
            log_lines.push_str(&record.encode_line());
            log_lines.push('\n');
        }
        for entry in &removed {
            let record = hasher.push(
                EventKind::Removed,
                Some(entry.prf),
                Some(entry.enc_meta.clone()),
            );
            log_lines.push_str(&record.encode_line());
            log_lines.push('\n');
        }

        let summary = SyncSummary {
            added: added.len(),
            removed: removed.len(),
        };

        self.storage
            .atomic_write(&self.storage.index_path(name), encode_index(&new_entries).as_bytes())?;
        let new_log = format!("{log_body}{log_lines}");
        self.storage
            .atomic_write(&self.storage.log_path(name), new_log.as_bytes())?;

        tracing::info!(
            dataset = name,
            added = summary.added,
            removed = summary.removed,
            "synced dataset from source"
        );
        Ok(summary)
    }

    /// Generate a fresh key, rebuild the whole index under it, and restart
    /// the change log as an ADDED-only sequence from the zero seed. Every
    /// pre-rekey ciphertext becomes undecryptable.
    pub fn rekey<I>(&self, name: &str, source: I) -> Result<SyncSummary>
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        validate_dataset_name(name)?;
        let lock = self.lock(name);
        let _guard = lock.write();

        self.load_schema_locked(name)?;

        let key = PrivateKey::generate();

        let mut desired: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for (ioc, meta) in source {
            desired.insert(ioc, meta);
        }

        let mut hasher = ChainHasher::new();
        let mut entries = Vec::with_capacity(desired.len());
        let mut log_lines = String::new();
        for (ioc, meta) in &desired {
            let entry = encrypt_entry(&key, name, ioc, meta);
            let record = hasher.push(
                EventKind::Added,
                Some(entry.prf),
                Some(entry.enc_meta.clone()),
            );
            log_lines.push_str(&record.encode_line());
            log_lines.push('\n');
            entries.push(entry);
        }

        self.storage
            .atomic_write_secret(&self.storage.key_path(name), &key.to_bytes())?;
        self.storage
            .atomic_write(&self.storage.index_path(name), encode_index(&entries).as_bytes())?;
        self.storage
            .atomic_write(&self.storage.log_path(name), log_lines.as_bytes())?;

        tracing::info!(dataset = name, entries = entries.len(), "rekeyed dataset");
        Ok(SyncSummary {
            added: entries.len(),
            removed: 0,
        })
    }

    /// Server side of the OPRF: `E = k·B` under this dataset's key.
    pub fn evaluate_oprf(&self, name: &str, blinded: &[u8]) -> Result<[u8; 32]> {
        validate_dataset_name(name)?;
        let lock = self.lock(name);
        let _guard = lock.read();

        self.load_schema_locked(name)?;
        let key = self.load_key_locked(name)?;
        crypto::evaluate(&key, blinded).map_err(|e| match e {
            CryptoError::InvalidEncoding(_) => ServerError::InvalidEncoding(e.to_string()),
            other => ServerError::Crypto(other),
        })
    }

    /// Read change records for a client at `since`.
    ///
    /// No `since`, or a hash that does not appear in the log, yields the
    /// full log (`SyncMode::Full`); a matching hash yields everything after
    /// it (`SyncMode::Delta`); the tip hash yields an empty delta.
    pub fn read_changes(
        &self,
        name: &str,
        since: Option<&str>,
    ) -> Result<(Vec<ChangeRecord>, SyncMode)> {
        validate_dataset_name(name)?;
        let lock = self.lock(name);
        let _guard = lock.read();

        self.load_schema_locked(name)?;
        let body = self.load_log_body_locked(name)?;
        let records = parse_log_body(&body)?;

        if let Some(since_hex) = since {
            if let Ok(since_hash) = ChainHash::from_hex(since_hex) {
                if let Some(position) = records.iter().position(|r| r.chain == since_hash) {
                    return Ok((records[position + 1..].to_vec(), SyncMode::Delta));
                }
            }
        }
        Ok((records, SyncMode::Full))
    }

    /// Validate `name`, confirm the dataset exists and return its schema.
    pub fn schema(&self, name: &str) -> Result<DatasetSchema> {
        validate_dataset_name(name)?;
        let lock = self.lock(name);
        let _guard = lock.read();
        self.load_schema_locked(name)
    }

    /// Load and validate the schema; shared-lock callers only.
    fn load_schema_locked(&self, name: &str) -> Result<DatasetSchema> {
        let bytes = self
            .storage
            .read_optional(&self.storage.schema_path(name))?
            .ok_or_else(|| ServerError::UnknownDataset(name.to_string()))?;
        let schema: DatasetSchema = serde_json::from_slice(&bytes)
            .map_err(|e| ServerError::CorruptState(format!("schema.json: {e}")))?;
        check_algorithm(&schema.supported_algorithm)?;
        Ok(schema)
    }

    fn load_key_locked(&self, name: &str) -> Result<PrivateKey> {
        let bytes = self
            .storage
            .read_optional(&self.storage.key_path(name))?
            .ok_or_else(|| ServerError::CorruptState(format!("{name}: private key missing")))?;
        PrivateKey::from_bytes(&bytes)
            .map_err(|e| ServerError::CorruptState(format!("{name}: {e}")))
    }

    fn load_index_locked(&self, name: &str) -> Result<Vec<IndexEntry>> {
        match self.storage.read_optional(&self.storage.index_path(name))? {
            Some(bytes) => {
                let body = String::from_utf8(bytes)
                    .map_err(|e| ServerError::CorruptState(format!("index.csv: {e}")))?;
                parse_index(&body)
            }
            None => Ok(Vec::new()),
        }
    }

    fn load_log_body_locked(&self, name: &str) -> Result<String> {
        match self.storage.read_optional(&self.storage.log_path(name))? {
            Some(bytes) => String::from_utf8(bytes)
                .map_err(|e| ServerError::CorruptState(format!("changes.log: {e}"))),
            None => Ok(String::new()),
        }
    }

    /// True when an existing entry still matches the incoming metadata, in
    /// which case its ciphertext (and nonce) are carried over unchanged.
    fn entry_unchanged(
        &self,
        name: &str,
        key: &PrivateKey,
        existing: &IndexEntry,
        meta: &[u8],
    ) -> bool {
        let (prf, q) = crypto::evaluate_direct(key, existing.ioc.as_bytes());
        if existing.prf != Prf(prf) {
            return false;
        }
        let aead_key = crypto::derive_key(&prf, &q, name);
        match crypto::open(
            &aead_key,
            existing.ioc.as_bytes(),
            &existing.enc_meta.nonce,
            &existing.enc_meta.ciphertext,
        ) {
            Ok(plaintext) => plaintext == meta,
            Err(_) => false,
        }
    }
}

fn check_algorithm(algorithm: &str) -> Result<()> {
    if algorithm == ALGORITHM_OT {
        return Err(ServerError::UnsupportedAlgorithm(
            "the ot algorithm tag is a placeholder and not implemented".to_string(),
        ));
    }
    if algorithm != ALGORITHM_CLASSIC {
        return Err(ServerError::UnsupportedAlgorithm(algorithm.to_string()));
    }
    Ok(())
}

fn encrypt_entry(key: &PrivateKey, name: &str, ioc: &str, meta: &[u8]) -> IndexEntry {
    let (prf, q) = crypto::evaluate_direct(key, ioc.as_bytes());
    let aead_key = crypto::derive_key(&prf, &q, name);
    let (nonce, ciphertext) = crypto::seal(&aead_key, ioc.as_bytes(), meta);
    IndexEntry {
        ioc: ioc.to_string(),
        prf: Prf(prf),
        enc_meta: EncMeta { nonce, ciphertext },
    }
}

fn parse_log_body(body: &str) -> Result<Vec<ChangeRecord>> {
    ChangeRecord::parse_log(body).map_err(ServerError::from)
}

fn log_tip(records: &[ChangeRecord]) -> ChainHash {
    records
        .last()
        .map(|record| record.chain)
        .unwrap_or_else(ChainHash::zero)
}
