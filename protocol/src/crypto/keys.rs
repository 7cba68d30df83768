//! # Key Management
//!
//! Ed25519 keypairs for ledger parties. A party's public key is its
//! owning key: it appears in every state the party owns and every batch
//! it issues, and a signature from it is what authorizes a transition.
//!
//! Key bytes are never logged. `Debug` on [`Keypair`] prints only the
//! public half.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignature,
}

// ---------------------------------------------------------------------------
// Keypair
// ---------------------------------------------------------------------------

/// An Ed25519 signing keypair owned by one ledger party.
///
/// Deliberately not `Serialize`: exporting a secret key is an explicit
/// call to [`Keypair::secret_key_bytes`], never a side effect of shoving
/// a struct into JSON.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generates a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Builds a keypair deterministically from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Rebuilds a keypair from a hex-encoded 32-byte secret.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// The public half of this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Signs `message`. Ed25519 is deterministic: same key and message,
    /// same signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature {
            bytes: self.signing_key.sign(message).to_bytes().to_vec(),
        }
    }

    /// Exports the raw secret. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair(pub={})", self.public_key().to_hex())
    }
}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// The public (owning) key of a party.
///
/// Ordered by raw bytes so that key sets iterate deterministically, which
/// matters for the canonical transaction encoding and for the selector's
/// issuer ordering.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey {
    bytes: [u8; 32],
}

impl PublicKey {
    /// Wraps raw bytes without validating the curve point.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Parses and validates a 32-byte slice.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// Parses a hex-encoded public key.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::try_from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Returns `true` if `signature` is a valid signature over `message`
    /// by this key. Malformed keys or signatures simply fail.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let Some(dalek_sig) = signature.to_dalek_signature() else {
            return false;
        };
        verifying_key.verify(message, &dalek_sig).is_ok()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// An Ed25519 signature. Always 64 bytes when produced by [`Keypair::sign`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    bytes: Vec<u8>,
}

impl Signature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn to_dalek_signature(&self) -> Option<DalekSignature> {
        let arr: [u8; 64] = self.bytes.as_slice().try_into().ok()?;
        Some(DalekSignature::from_bytes(&arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Parses a hex-encoded signature.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidSignature)?;
        if bytes.len() != 64 {
            return Err(KeyError::InvalidSignature);
        }
        Ok(Self { bytes })
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() >= 128 {
            write!(f, "Signature({}...{})", &hex_str[..8], &hex_str[120..])
        } else {
            write!(f, "Signature({})", hex_str)
        }
    }
}
