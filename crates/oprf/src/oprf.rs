//! Stateless OPRF operations
//!
//! Blind and unblind run on the client, evaluate on the server. The identity
//! `unblind(r, evaluate(k, blind(x))) = k·H1(x)` holds for every valid `r`,
//! which is what makes the client's finalized PRF equal to the server's
//! direct evaluation.

use curve25519_dalek::scalar::Scalar;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Result;
use crate::key::PrivateKey;
use crate::primitives;

/// Encoded Ristretto255 element length.
pub const POINT_LEN: usize = 32;

/// Finalized PRF output length (SHA-512).
pub const PRF_LEN: usize = 64;

/// Derived AEAD key length.
pub const KEY_LEN: usize = 32;

/// Info prefix for per-entry key derivation; the dataset name is appended.
const KDF_INFO_PREFIX: &[u8] = b"meta|";

/// Client-side blinding state for one query.
///
/// Holds the ephemeral blinding scalar, zeroized on drop. The encoded blinded
/// element is what goes on the wire.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Blinding {
    r: Scalar,
    blinded: [u8; POINT_LEN],
}

impl Blinding {
    /// Encoded blinded element `B = r·H1(ioc)`.
    pub fn blinded(&self) -> &[u8; POINT_LEN] {
        &self.blinded
    }
}

/// Blind an indicator: `B = r·H1(ioc)` for a fresh non-zero `r`.
pub fn blind(ioc: &[u8]) -> Blinding {
    let p = primitives::hash_to_group(ioc);
    let r = primitives::random_scalar();
    Blinding {
        r,
        blinded: primitives::encode_point(&(r * p)),
    }
}

/// Server evaluation: `E = k·B`. Fails if `blinded` is not a canonical group
/// element.
pub fn evaluate(key: &PrivateKey, blinded: &[u8]) -> Result<[u8; POINT_LEN]> {
    let b = primitives::decode_point(blinded)?;
    Ok(primitives::encode_point(&(key.scalar() * b)))
}

/// Client unblinding: `Q = r⁻¹·E`. Fails if `evaluated` is not a canonical
/// group element.
pub fn unblind(blinding: &Blinding, evaluated: &[u8]) -> Result<[u8; POINT_LEN]> {
    let e = primitives::decode_point(evaluated)?;
    Ok(primitives::encode_point(&(blinding.r.invert() * e)))
}

/// Finalize: `PRF = SHA-512(ioc ‖ Q)`.
pub fn finalize(ioc: &[u8], q: &[u8; POINT_LEN]) -> [u8; PRF_LEN] {
    let mut input = Vec::with_capacity(ioc.len() + POINT_LEN);
    input.extend_from_slice(ioc);
    input.extend_from_slice(q);
    primitives::sha512(&input)
}

/// Derive the per-entry AEAD key from the PRF, the unblinded element and the
/// dataset name: `HKDF-SHA512(ikm = PRF ‖ Q, info = "meta|" ‖ name)`.
pub fn derive_key(prf: &[u8; PRF_LEN], q: &[u8; POINT_LEN], dataset_name: &str) -> [u8; KEY_LEN] {
    let mut ikm = [0u8; PRF_LEN + POINT_LEN];
    ikm[..PRF_LEN].copy_from_slice(prf);
    ikm[PRF_LEN..].copy_from_slice(q);

    let mut info = Vec::with_capacity(KDF_INFO_PREFIX.len() + dataset_name.len());
    info.extend_from_slice(KDF_INFO_PREFIX);
    info.extend_from_slice(dataset_name.as_bytes());

    let mut key = [0u8; KEY_LEN];
    primitives::hkdf_sha512(&ikm, &info, &mut key);
    ikm.zeroize();
    key
}

/// Server-side direct evaluation for index building: returns `(PRF, Q)`
/// without the blinding round trip.
pub fn evaluate_direct(key: &PrivateKey, ioc: &[u8]) -> ([u8; PRF_LEN], [u8; POINT_LEN]) {
    let p = primitives::hash_to_group(ioc);
    let q = primitives::encode_point(&(key.scalar() * p));
    (finalize(ioc, &q), q)
}
