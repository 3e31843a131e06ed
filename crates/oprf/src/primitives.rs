//! Thin typed surface over the vetted crypto crates.
//!
//! Everything fallible returns a `CryptoError`; nothing in here panics on
//! untrusted input. Hex and other boundary encodings live elsewhere; this
//! module speaks fixed-size byte arrays only.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};

use crate::error::{CryptoError, Result};

/// Hash-to-group for Ristretto255 with SHA-512 (library-internal domain
/// separation).
pub fn hash_to_group(input: &[u8]) -> RistrettoPoint {
    RistrettoPoint::hash_from_bytes::<Sha512>(input)
}

/// Uniform random non-zero scalar from the OS CSPRNG.
pub fn random_scalar() -> Scalar {
    loop {
        let s = Scalar::random(&mut OsRng);
        if s != Scalar::ZERO {
            return s;
        }
    }
}

/// Decode a canonical 32-byte Ristretto255 element.
pub fn decode_point(bytes: &[u8]) -> Result<RistrettoPoint> {
    let compressed = CompressedRistretto::from_slice(bytes)
        .map_err(|_| CryptoError::InvalidEncoding("group element must be 32 bytes"))?;
    compressed
        .decompress()
        .ok_or(CryptoError::InvalidEncoding("not a canonical group element"))
}

/// Encode a Ristretto255 element to its canonical 32 bytes.
pub fn encode_point(point: &RistrettoPoint) -> [u8; 32] {
    point.compress().to_bytes()
}

pub fn sha512(input: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(&Sha512::digest(input));
    out
}

/// HKDF-SHA512 with an empty salt, expanded to `out.len()` bytes.
pub fn hkdf_sha512(ikm: &[u8], info: &[u8], out: &mut [u8]) {
    let hk = Hkdf::<Sha512>::new(None, ikm);
    hk.expand(info, out)
        .expect("output length within HKDF-SHA512 bounds");
}

/// Fresh random 24-byte XChaCha20 nonce.
pub fn random_nonce() -> [u8; 24] {
    use rand::RngCore;
    let mut nonce = [0u8; 24];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// XChaCha20-Poly1305-IETF seal. The returned ciphertext carries the 16-byte
/// tag at the end.
pub fn aead_seal(key: &[u8; 32], nonce: &[u8; 24], aad: &[u8], plaintext: &[u8]) -> Vec<u8> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .encrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .expect("XChaCha20-Poly1305 encryption is infallible for in-memory buffers")
}

/// XChaCha20-Poly1305-IETF open. `AuthFailed` on any tag or AAD mismatch.
pub fn aead_open(
    key: &[u8; 32],
    nonce: &[u8; 24],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::AuthFailed)
}
