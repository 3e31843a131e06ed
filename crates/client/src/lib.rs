//! Blindfeed client
//!
//! Mirrors a server's change log locally, projects it into an active index
//! of `PRF → encrypted metadata`, and answers indicator queries without the
//! server ever seeing the indicator: the only things sent over the wire are
//! a blinded group element and the local tip hash.

mod error;
mod mirror;
mod transport;

use std::path::PathBuf;

use blindfeed_oprf as crypto;
use blindfeed_protocol::{validate_dataset_name, Prf, SyncMode};

pub use error::{ClientError, Result};
pub use mirror::Mirror;
pub use transport::ServerEndpoint;

/// Outcome of one indicator query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// The indicator is in the dataset; decrypted metadata attached.
    Match(Vec<u8>),
    /// The indicator is not in the dataset.
    NoMatch,
    /// The indicator's PRF is present but the metadata failed to decrypt
    /// (stale ciphertext from before a rekey, or a tampered entry).
    DecryptFailed,
}

/// What a sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub applied: usize,
}

/// A client bound to one server and a local state directory.
pub struct Client {
    endpoint: ServerEndpoint,
    state_root: PathBuf,
}

impl Client {
    pub fn new(server: &str, state_root: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: ServerEndpoint::new(server),
            state_root: state_root.into(),
        }
    }

    /// The mirror holding local state for `dataset` on this server.
    pub fn mirror(&self, dataset: &str) -> Mirror {
        Mirror::new(&self.state_root, &self.endpoint.label(), dataset)
    }

    /// Fetch and apply changes, starting from the local tip. A server that
    /// does not recognize the tip (e.g. after a rekey) answers with a full
    /// replay, which replaces all local state. Local-chain damage is
    /// repaired the same way: one automatic full resync.
    pub async fn sync(&self, dataset: &str) -> Result<SyncReport> {
        let tip = self.mirror(dataset).tip_hex().unwrap_or(None);
        self.sync_since(dataset, tip.as_deref()).await
    }

    /// Sync with an explicit starting hash (`None` forces a full fetch).
    pub async fn sync_since(&self, dataset: &str, since: Option<&str>) -> Result<SyncReport> {
        validate_dataset_name(dataset)?;
        let mirror = self.mirror(dataset);

        let (body, mode) = self.endpoint.fetch_changes(dataset, since).await?;
        let applied = match mode {
            SyncMode::Full => mirror.apply_full(&body)?,
            SyncMode::Delta => match mirror.apply_delta(&body) {
                Ok(applied) => applied,
                Err(ClientError::Inconsistent(reason)) => {
                    tracing::warn!(dataset, reason, "delta apply failed; full resync");
                    let (body, _) = self.endpoint.fetch_changes(dataset, None).await?;
                    return Ok(SyncReport {
                        mode: SyncMode::Full,
                        applied: mirror.apply_full(&body)?,
                    });
                }
                Err(other) => return Err(other),
            },
        };
        Ok(SyncReport { mode, applied })
    }

    /// Discard all local state for `dataset`, then sync from scratch.
    pub async fn reset(&self, dataset: &str) -> Result<SyncReport> {
        validate_dataset_name(dataset)?;
        self.mirror(dataset).purge()?;
        self.sync_since(dataset, None).await
    }

    /// Delete local state without contacting the server.
    pub fn purge(&self, dataset: &str) -> Result<()> {
        validate_dataset_name(dataset)?;
        self.mirror(dataset).purge()
    }

    /// Query one indicator.
    ///
    /// Syncs first (best-effort when a local log already exists), confirms
    /// the server speaks our suite, runs the OPRF round trip, and resolves
    /// the PRF against the active index.
    pub async fn query(&self, dataset: &str, ioc: &str) -> Result<QueryResult> {
        validate_dataset_name(dataset)?;
        let mirror = self.mirror(dataset);

        if let Err(e) = self.sync(dataset).await {
            if mirror.has_log() {
                tracing::warn!(dataset, error = %e, "sync failed; querying local mirror");
            } else {
                return Err(e);
            }
        }

        let info = self.endpoint.encryption_info(dataset).await?;
        if !info.is_supported() {
            return Err(ClientError::UnsupportedSuite {
                suite: info.suite,
                encryption: info.encryption,
            });
        }

        let blinding = crypto::blind(ioc.as_bytes());
        let evaluated = self.endpoint.evaluate(dataset, blinding.blinded()).await?;
        let q = crypto::unblind(&blinding, &evaluated)?;
        let prf = crypto::finalize(ioc.as_bytes(), &q);

        let enc_meta = match mirror.lookup(&Prf(prf))? {
            Some(meta) => meta,
            None => return Ok(QueryResult::NoMatch),
        };

        let key = crypto::derive_key(&prf, &q, dataset);
        match crypto::open(&key, ioc.as_bytes(), &enc_meta.nonce, &enc_meta.ciphertext) {
            Ok(metadata) => {
                mirror.record_match(ioc, &Prf(prf), &metadata)?;
                Ok(QueryResult::Match(metadata))
            }
            Err(crypto::CryptoError::AuthFailed) => Ok(QueryResult::DecryptFailed),
            Err(other) => Err(other.into()),
        }
    }
}
