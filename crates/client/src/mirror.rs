//! Local change-log mirror and active index
//!
//! The mirror keeps, per `(server, dataset)`, a copy of the server's change
//! log, the active index projected from it (`PRF → nonce:ciphertext` for
//! entries currently present), and an append-only match history. The active
//! index is a cache: it is always rebuildable from the log, and any full
//! sync rebuilds it from scratch.
//!
//! Every record applied here is verified against the hash chain first; a
//! mismatch anywhere surfaces as `Inconsistent`, which the caller resolves
//! with a full resync.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use blindfeed_protocol::{
    verify_chain, ChainHash, ChangeRecord, EncMeta, EventKind, Prf,
};

use crate::error::{ClientError, Result};

const LOG_FILE: &str = "changes.log";
const ACTIVE_INDEX_FILE: &str = "active_index.csv";
const MATCHES_FILE: &str = "matches.txt";

/// Local state for one `(server, dataset)` pair.
pub struct Mirror {
    dir: PathBuf,
}

impl Mirror {
    pub fn new(state_root: &Path, server_label: &str, dataset: &str) -> Self {
        Self {
            dir: state_root.join(server_label).join(dataset),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    fn active_index_path(&self) -> PathBuf {
        self.dir.join(ACTIVE_INDEX_FILE)
    }

    fn matches_path(&self) -> PathBuf {
        self.dir.join(MATCHES_FILE)
    }

    /// Whether any local log exists (the `Initialized` state).
    pub fn has_log(&self) -> bool {
        self.log_path().exists()
    }

    /// Hex of the last applied chain hash, if any.
    pub fn tip_hex(&self) -> Result<Option<String>> {
        let records = match self.load_records()? {
            Some(records) => records,
            None => return Ok(None),
        };
        Ok(records.last().map(|record| record.chain.to_hex()))
    }

    /// Load and parse the local log; `None` when no log exists yet.
    pub fn load_records(&self) -> Result<Option<Vec<ChangeRecord>>> {
        let body = match fs::read_to_string(self.log_path()) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let records = ChangeRecord::parse_log(&body)
            .map_err(|e| ClientError::Inconsistent(format!("local log: {e}")))?;
        Ok(Some(records))
    }

    /// Replace the local log with a full replay and rebuild the active
    /// index. The records must chain correctly from the zero seed.
    pub fn apply_full(&self, body: &str) -> Result<usize> {
        let records = ChangeRecord::parse_log(body)
            .map_err(|e| ClientError::Inconsistent(format!("full response: {e}")))?;
        verify_chain(ChainHash::zero(), &records)
            .map_err(|e| ClientError::Inconsistent(format!("full response: {e}")))?;

        let mut active = BTreeMap::new();
        for record in &records {
            // On a full rebuild an unlocatable REMOVED has nothing to
            // remove; skipping it is the correct projection.
            apply_record(&mut active, record, true)?;
        }

        fs::create_dir_all(&self.dir)?;
        atomic_write(&self.log_path(), normalize(body).as_bytes())?;
        self.write_active_index(&active)?;
        Ok(records.len())
    }

    /// Append a delta to the local log after verifying both the local chain
    /// and the delta's continuation of it, then update the active index.
    pub fn apply_delta(&self, body: &str) -> Result<usize> {
        let local = self
            .load_records()?
            .ok_or_else(|| ClientError::Inconsistent("delta without local log".to_string()))?;
        verify_chain(ChainHash::zero(), &local)
            .map_err(|e| ClientError::Inconsistent(format!("local log: {e}")))?;
        let tip = local
            .last()
            .map(|record| record.chain)
            .unwrap_or_else(ChainHash::zero);

        let delta = ChangeRecord::parse_log(body)
            .map_err(|e| ClientError::Inconsistent(format!("delta response: {e}")))?;
        verify_chain(tip, &delta)
            .map_err(|e| ClientError::Inconsistent(format!("delta response: {e}")))?;

        let mut active = self.load_active_index()?;
        for record in &delta {
            apply_record(&mut active, record, false)?;
        }

        if !delta.is_empty() {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.log_path())?;
            file.write_all(normalize(body).as_bytes())?;
            file.sync_all()?;
            self.write_active_index(&active)?;
        }
        Ok(delta.len())
    }

    /// Look up the encrypted metadata for a PRF in the active index.
    pub fn lookup(&self, prf: &Prf) -> Result<Option<EncMeta>> {
        Ok(self.load_active_index()?.remove(&prf.to_hex()))
    }

    fn load_active_index(&self) -> Result<BTreeMap<String, EncMeta>> {
        let body = match fs::read_to_string(self.active_index_path()) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        let mut active = BTreeMap::new();
        for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (prf_hex, meta_field) = line.split_once(',').ok_or_else(|| {
                ClientError::Inconsistent(format!("active index line: {line:?}"))
            })?;
            let meta = EncMeta::from_field(meta_field)
                .map_err(|e| ClientError::Inconsistent(format!("active index: {e}")))?;
            active.insert(prf_hex.to_ascii_lowercase(), meta);
        }
        Ok(active)
    }

    fn write_active_index(&self, active: &BTreeMap<String, EncMeta>) -> Result<()> {
        let mut body = String::new();
        for (prf_hex, meta) in active {
            body.push_str(prf_hex);
            body.push(',');
            body.push_str(&meta.to_field());
            body.push('\n');
        }
        atomic_write(&self.active_index_path(), body.as_bytes())?;
        Ok(())
    }

    /// Append one line of match history.
    pub fn record_match(&self, ioc: &str, prf: &Prf, metadata: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.matches_path())?;
        writeln!(
            file,
            "{},{},{}",
            ioc,
            prf.to_hex(),
            String::from_utf8_lossy(metadata)
        )?;
        Ok(())
    }

    /// Delete all local state for this `(server, dataset)` pair. Missing
    /// state is not an error. The per-server directory is pruned if empty.
    pub fn purge(&self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        if let Some(parent) = self.dir.parent() {
            // Ignore failures: the directory may be shared or already gone.
            let _ = fs::remove_dir(parent);
        }
        Ok(())
    }
}

/// Apply one record to the active-index projection.
///
/// ADDED inserts or overwrites. REMOVED deletes by PRF; a REMOVED without a
/// PRF cannot be located and is only tolerated during a full rebuild.
fn apply_record(
    active: &mut BTreeMap<String, EncMeta>,
    record: &ChangeRecord,
    full_rebuild: bool,
) -> Result<()> {
    match (record.kind, &record.prf) {
        (EventKind::Added, Some(prf)) => {
            let meta = record.enc_meta.clone().ok_or_else(|| {
                ClientError::Inconsistent("ADDED record without enc_meta".to_string())
            })?;
            active.insert(prf.to_hex(), meta);
        }
        (EventKind::Added, None) => {
            return Err(ClientError::Inconsistent(
                "ADDED record without PRF".to_string(),
            ));
        }
        (EventKind::Removed, Some(prf)) => {
            active.remove(&prf.to_hex());
        }
        (EventKind::Removed, None) if full_rebuild => {
            tracing::warn!("REMOVED record without PRF; nothing to remove");
        }
        (EventKind::Removed, None) => {
            return Err(ClientError::Inconsistent(
                "REMOVED record without PRF".to_string(),
            ));
        }
    }
    Ok(())
}

/// Ensure a trailing newline so later appends start on a fresh line.
fn normalize(body: &str) -> String {
    if body.is_empty() || body.ends_with('\n') {
        body.to_string()
    } else {
        format!("{body}\n")
    }
}

fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blindfeed_protocol::ChainHasher;

    fn meta(byte: u8) -> EncMeta {
        EncMeta {
            nonce: [byte; 24],
            ciphertext: vec![byte; 32],
        }
    }

    fn log_body(records: &[ChangeRecord]) -> String {
        records
            .iter()
            .map(|r| format!("{}\n", r.encode_line()))
            .collect()
    }

    fn new_mirror() -> (tempfile::TempDir, Mirror) {
        let dir = tempfile::tempdir().unwrap();
        let mirror = Mirror::new(dir.path(), "127.0.0.1_8000", "ds1");
        (dir, mirror)
    }

    #[test]
    fn full_apply_builds_the_active_index() {
        let (_dir, mirror) = new_mirror();
        let mut hasher = ChainHasher::new();
        let records = vec![
            hasher.push(EventKind::Added, Some(Prf([1; 64])), Some(meta(1))),
            hasher.push(EventKind::Added, Some(Prf([2; 64])), Some(meta(2))),
            hasher.push(EventKind::Removed, Some(Prf([1; 64])), Some(meta(1))),
        ];
        mirror.apply_full(&log_body(&records)).unwrap();

        assert_eq!(mirror.lookup(&Prf([1; 64])).unwrap(), None);
        assert_eq!(mirror.lookup(&Prf([2; 64])).unwrap(), Some(meta(2)));
        assert_eq!(mirror.tip_hex().unwrap().unwrap(), records[2].chain.to_hex());
    }

    #[test]
    fn delta_extends_the_log_and_index() {
        let (_dir, mirror) = new_mirror();
        let mut hasher = ChainHasher::new();
        let first = vec![hasher.push(EventKind::Added, Some(Prf([1; 64])), Some(meta(1)))];
        mirror.apply_full(&log_body(&first)).unwrap();

        let delta = vec![
            hasher.push(EventKind::Added, Some(Prf([2; 64])), Some(meta(2))),
            hasher.push(EventKind::Removed, Some(Prf([1; 64])), Some(meta(1))),
        ];
        let applied = mirror.apply_delta(&log_body(&delta)).unwrap();
        assert_eq!(applied, 2);

        assert_eq!(mirror.lookup(&Prf([1; 64])).unwrap(), None);
        assert_eq!(mirror.lookup(&Prf([2; 64])).unwrap(), Some(meta(2)));

        // The whole mirrored log still verifies end to end.
        let records = mirror.load_records().unwrap().unwrap();
        verify_chain(ChainHash::zero(), &records).unwrap();
    }

    #[test]
    fn delta_application_equals_full_rebuild() {
        let mut hasher = ChainHasher::new();
        let records = vec![
            hasher.push(EventKind::Added, Some(Prf([1; 64])), Some(meta(1))),
            hasher.push(EventKind::Added, Some(Prf([2; 64])), Some(meta(2))),
            hasher.push(EventKind::Removed, Some(Prf([1; 64])), Some(meta(1))),
            hasher.push(EventKind::Added, Some(Prf([3; 64])), Some(meta(3))),
        ];

        let (_dir_a, incremental) = new_mirror();
        incremental.apply_full(&log_body(&records[..2])).unwrap();
        incremental.apply_delta(&log_body(&records[2..])).unwrap();

        let (_dir_b, rebuilt) = new_mirror();
        rebuilt.apply_full(&log_body(&records)).unwrap();

        let read = |m: &Mirror| fs::read_to_string(m.dir().join(ACTIVE_INDEX_FILE)).unwrap();
        assert_eq!(read(&incremental), read(&rebuilt));
    }

    #[test]
    fn delta_that_does_not_continue_the_tip_is_inconsistent() {
        let (_dir, mirror) = new_mirror();
        let mut hasher = ChainHasher::new();
        let first = vec![hasher.push(EventKind::Added, Some(Prf([1; 64])), Some(meta(1)))];
        mirror.apply_full(&log_body(&first)).unwrap();

        // A delta chained from the zero seed instead of the tip.
        let mut stray = ChainHasher::new();
        let bad = vec![stray.push(EventKind::Added, Some(Prf([2; 64])), Some(meta(2)))];
        assert!(matches!(
            mirror.apply_delta(&log_body(&bad)),
            Err(ClientError::Inconsistent(_))
        ));
    }

    #[test]
    fn tampered_local_log_is_detected_on_delta() {
        let (_dir, mirror) = new_mirror();
        let mut hasher = ChainHasher::new();
        let records = vec![
            hasher.push(EventKind::Added, Some(Prf([1; 64])), Some(meta(1))),
            hasher.push(EventKind::Added, Some(Prf([2; 64])), Some(meta(2))),
        ];
        mirror.apply_full(&log_body(&records)).unwrap();

        // Flip one hex digit of the first line's PRF on disk.
        let path = mirror.dir().join(LOG_FILE);
        let mut body = fs::read_to_string(&path).unwrap();
        let flipped = if &body[6..7] == "0" { "1" } else { "0" };
        body.replace_range(6..7, flipped);
        fs::write(&path, body).unwrap();

        let delta = vec![hasher.push(EventKind::Added, Some(Prf([3; 64])), Some(meta(3)))];
        assert!(matches!(
            mirror.apply_delta(&log_body(&delta)),
            Err(ClientError::Inconsistent(_))
        ));
    }

    #[test]
    fn unlocatable_removed_is_fatal_in_delta_but_skipped_in_full() {
        let mut hasher = ChainHasher::new();
        let records = vec![
            hasher.push(EventKind::Added, Some(Prf([1; 64])), Some(meta(1))),
            hasher.push(EventKind::Removed, None, None),
        ];
        let body = log_body(&records);

        let (_dir, mirror) = new_mirror();
        mirror.apply_full(&body).unwrap();
        assert_eq!(mirror.lookup(&Prf([1; 64])).unwrap(), Some(meta(1)));

        let (_dir2, fresh) = new_mirror();
        let first = log_body(&records[..1]);
        fresh.apply_full(&first).unwrap();
        assert!(matches!(
            fresh.apply_delta(&log_body(&records[1..])),
            Err(ClientError::Inconsistent(_))
        ));
    }

    #[test]
    fn purge_removes_all_state() {
        let (_dir, mirror) = new_mirror();
        let mut hasher = ChainHasher::new();
        let records = vec![hasher.push(EventKind::Added, Some(Prf([1; 64])), Some(meta(1)))];
        mirror.apply_full(&log_body(&records)).unwrap();
        assert!(mirror.has_log());

        mirror.purge().unwrap();
        assert!(!mirror.has_log());
        assert!(!mirror.dir().exists());

        // Purging again is fine.
        mirror.purge().unwrap();
    }
}
