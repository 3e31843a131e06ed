//! Blindfeed crypto core
//!
//! Implements the two-party OPRF over Ristretto255 that the lookup protocol
//! is built on, plus the per-entry metadata cipher.
//!
//! ## Protocol overview
//!
//! The server holds a private scalar `k` per dataset. For an indicator `x`:
//!
//! 1. Client: `P = H1(x)`, samples random non-zero `r`, sends `B = r·P`
//! 2. Server: `E = k·B` (learns nothing about `x`)
//! 3. Client: `Q = r⁻¹·E = k·H1(x)`
//! 4. Client: `PRF = SHA-512(x ‖ encode(Q))`
//!
//! The per-entry encryption key is `HKDF-SHA512(PRF ‖ encode(Q))` with the
//! dataset name bound into the `info` parameter, so the PRF alone (which is
//! public in the change log) is not enough to decrypt; only a party that ran
//! the OPRF for that exact indicator holds `Q`.
//!
//! Metadata is sealed with XChaCha20-Poly1305-IETF using the indicator as
//! associated data, which ties each ciphertext to its entry.

mod cipher;
mod error;
mod key;
mod oprf;
pub mod primitives;

pub use cipher::{open, seal, NONCE_LEN, TAG_LEN};
pub use error::{CryptoError, Result};
pub use key::{PrivateKey, PRIVATE_KEY_LEN};
pub use oprf::{
    blind, derive_key, evaluate, evaluate_direct, finalize, unblind, Blinding, KEY_LEN, POINT_LEN,
    PRF_LEN,
};
