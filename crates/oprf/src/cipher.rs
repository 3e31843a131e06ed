//! Metadata cipher
//!
//! Per-entry AEAD wrapping with the indicator as associated data. The nonce
//! is public and stored next to the ciphertext; the AAD binding is what
//! prevents a ciphertext from being replayed under a different entry.

use crate::error::Result;
use crate::oprf::KEY_LEN;
use crate::primitives;

/// XChaCha20 nonce length.
pub const NONCE_LEN: usize = 24;

/// Poly1305 tag length appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Encrypt metadata under a derived key with a fresh random nonce.
pub fn seal(key: &[u8; KEY_LEN], ioc: &[u8], metadata: &[u8]) -> ([u8; NONCE_LEN], Vec<u8>) {
    let nonce = primitives::random_nonce();
    let ciphertext = primitives::aead_seal(key, &nonce, ioc, metadata);
    (nonce, ciphertext)
}

/// Decrypt metadata. `AuthFailed` on wrong key, wrong indicator or tampered
/// ciphertext; callers surface that as a negative lookup result, not a
/// fault.
pub fn open(
    key: &[u8; KEY_LEN],
    ioc: &[u8],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    primitives::aead_open(key, nonce, ioc, ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CryptoError;

    fn key(byte: u8) -> [u8; KEY_LEN] {
        [byte; KEY_LEN]
    }

    #[test]
    fn seal_open_roundtrip() {
        let meta = br#"{"desc":"known bad domain"}"#;
        let (nonce, ct) = seal(&key(7), b"evil.com", meta);
        assert_eq!(ct.len(), meta.len() + TAG_LEN);
        let opened = open(&key(7), b"evil.com", &nonce, &ct).unwrap();
        assert_eq!(opened, meta);
    }

    #[test]
    fn open_fails_for_different_ioc() {
        let (nonce, ct) = seal(&key(7), b"evil.com", b"meta");
        assert_eq!(
            open(&key(7), b"benign.com", &nonce, &ct).unwrap_err(),
            CryptoError::AuthFailed
        );
    }

    #[test]
    fn open_fails_for_wrong_key_or_tampered_ciphertext() {
        let (nonce, mut ct) = seal(&key(7), b"evil.com", b"meta");
        assert_eq!(
            open(&key(8), b"evil.com", &nonce, &ct).unwrap_err(),
            CryptoError::AuthFailed
        );
        ct[0] ^= 1;
        assert_eq!(
            open(&key(7), b"evil.com", &nonce, &ct).unwrap_err(),
            CryptoError::AuthFailed
        );
    }

    #[test]
    fn nonces_are_fresh_per_seal() {
        let (n1, c1) = seal(&key(7), b"evil.com", b"meta");
        let (n2, c2) = seal(&key(7), b"evil.com", b"meta");
        assert_ne!(n1, n2);
        assert_ne!(c1, c2);
    }

    #[test]
    fn empty_metadata_is_just_a_tag() {
        let (nonce, ct) = seal(&key(1), b"x", b"");
        assert_eq!(ct.len(), TAG_LEN);
        assert_eq!(open(&key(1), b"x", &nonce, &ct).unwrap(), Vec::<u8>::new());
    }
}
