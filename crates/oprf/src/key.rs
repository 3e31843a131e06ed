//! Dataset private key

use curve25519_dalek::scalar::Scalar;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, Result};
use crate::primitives;

/// Serialized private key length.
pub const PRIVATE_KEY_LEN: usize = 32;

/// The server-side OPRF key: a non-zero scalar in the Ristretto255 order.
///
/// Zeroized on drop. `Debug` never prints key material.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey(Scalar);

impl PrivateKey {
    /// Generate a fresh key from the OS CSPRNG.
    pub fn generate() -> Self {
        Self(primitives::random_scalar())
    }

    /// Load a key from its canonical 32-byte form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; PRIVATE_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidEncoding("private key must be 32 bytes"))?;
        let scalar = Option::<Scalar>::from(Scalar::from_canonical_bytes(raw))
            .ok_or(CryptoError::InvalidEncoding("private key is not a canonical scalar"))?;
        if scalar == Scalar::ZERO {
            return Err(CryptoError::InvalidEncoding("private key scalar is zero"));
        }
        Ok(Self(scalar))
    }

    /// Canonical 32-byte form for persistence.
    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_LEN] {
        self.0.to_bytes()
    }

    pub(crate) fn scalar(&self) -> &Scalar {
        &self.0
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}
