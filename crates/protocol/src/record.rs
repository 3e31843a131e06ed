//! Change-log records
//!
//! One line per event:
//!
//! ```text
//! EVENT PRF_HEX ENC_META_HEX CHAIN_HASH_HEX
//! ```
//!
//! `EVENT` is `ADDED` or `REMOVED`. `PRF_HEX` is 128 hex chars, or `-` when
//! unknown (legal only on `REMOVED`). `ENC_META_HEX` is `nonce_hex:ct_hex`
//! or `-`. `CHAIN_HASH_HEX` is 128 hex chars. The placeholder tokens take
//! part in the hash chain exactly as written.

use crate::error::{ProtocolError, Result};

/// PRF output length in bytes (SHA-512).
pub const PRF_LEN: usize = 64;

/// Chain hash length in bytes (SHA-512).
pub const CHAIN_HASH_LEN: usize = 64;

/// Nonce length inside an `enc_meta` field.
const NONCE_LEN: usize = 24;

const PLACEHOLDER: &str = "-";

/// A finalized PRF value keyed into the index and the change log.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prf(pub [u8; PRF_LEN]);

impl Prf {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        decode_fixed::<PRF_LEN>(s, "prf").map(Prf)
    }
}

impl std::fmt::Debug for Prf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Prf({}…)", &self.to_hex()[..8])
    }
}

/// A link in the change-log hash chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainHash(pub [u8; CHAIN_HASH_LEN]);

impl ChainHash {
    /// The seed preceding the first record: 64 zero bytes.
    pub fn zero() -> Self {
        ChainHash([0u8; CHAIN_HASH_LEN])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        decode_fixed::<CHAIN_HASH_LEN>(s, "chain hash").map(ChainHash)
    }
}

impl std::fmt::Debug for ChainHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChainHash({}…)", &self.to_hex()[..8])
    }
}

/// Encrypted metadata as carried by the log and the client's active index.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EncMeta {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

impl EncMeta {
    /// Field form `nonce_hex:ct_hex`.
    pub fn to_field(&self) -> String {
        format!("{}:{}", hex::encode(self.nonce), hex::encode(&self.ciphertext))
    }

    pub fn from_field(s: &str) -> Result<Self> {
        let (nonce_hex, ct_hex) = s.split_once(':').ok_or_else(|| {
            ProtocolError::MalformedRecord(format!("enc_meta missing ':' separator: {s:?}"))
        })?;
        let nonce = decode_fixed::<NONCE_LEN>(nonce_hex, "nonce")?;
        let ciphertext = hex::decode(ct_hex).map_err(|e| ProtocolError::InvalidHex {
            field: "ciphertext",
            detail: e.to_string(),
        })?;
        Ok(EncMeta { nonce, ciphertext })
    }
}

/// Event kind of a change record.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EventKind {
    Added,
    Removed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Added => "ADDED",
            EventKind::Removed => "REMOVED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "ADDED" => Ok(EventKind::Added),
            "REMOVED" => Ok(EventKind::Removed),
            other => Err(ProtocolError::UnknownEventKind(other.to_string())),
        }
    }
}

/// One immutable change-log entry.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ChangeRecord {
    pub kind: EventKind,
    /// Absent only on `REMOVED` events whose PRF was unrecoverable.
    pub prf: Option<Prf>,
    pub enc_meta: Option<EncMeta>,
    pub chain: ChainHash,
}

impl ChangeRecord {
    /// The PRF token as written to the line (`-` when absent).
    pub fn prf_field(&self) -> String {
        match &self.prf {
            Some(prf) => prf.to_hex(),
            None => PLACEHOLDER.to_string(),
        }
    }

    /// The enc-meta token as written to the line (`-` when absent).
    pub fn enc_meta_field(&self) -> String {
        match &self.enc_meta {
            Some(meta) => meta.to_field(),
            None => PLACEHOLDER.to_string(),
        }
    }

    pub fn encode_line(&self) -> String {
        format!(
            "{} {} {} {}",
            self.kind.as_str(),
            self.prf_field(),
            self.enc_meta_field(),
            self.chain.to_hex()
        )
    }

    pub fn parse_line(line: &str) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        let (kind, prf, enc_meta, chain) = match (
            tokens.next(),
            tokens.next(),
            tokens.next(),
            tokens.next(),
            tokens.next(),
        ) {
            (Some(kind), Some(prf), Some(meta), Some(chain), None) => (kind, prf, meta, chain),
            _ => {
                return Err(ProtocolError::MalformedRecord(format!(
                    "expected 4 fields: {line:?}"
                )))
            }
        };

        let kind = EventKind::parse(kind)?;
        let prf = match prf {
            PLACEHOLDER => None,
            hex => Some(Prf::from_hex(hex)?),
        };
        let enc_meta = match enc_meta {
            PLACEHOLDER => None,
            field => Some(EncMeta::from_field(field)?),
        };
        let chain = ChainHash::from_hex(chain)?;

        Ok(ChangeRecord {
            kind,
            prf,
            enc_meta,
            chain,
        })
    }

    /// Parse every non-blank line of a log body.
    pub fn parse_log(body: &str) -> Result<Vec<Self>> {
        body.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Self::parse_line)
            .collect()
    }
}

fn decode_fixed<const N: usize>(s: &str, field: &'static str) -> Result<[u8; N]> {
    let bytes = hex::decode(s).map_err(|e| ProtocolError::InvalidHex {
        field,
        detail: e.to_string(),
    })?;
    bytes.try_into().map_err(|v: Vec<u8>| ProtocolError::InvalidHex {
        field,
        detail: format!("expected {N} bytes, got {}", v.len()),
    })
}
