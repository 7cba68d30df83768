//! # Party IDs
//!
//! The human-facing address of a ledger party, derived from its owning
//! key:
//!
//! ```text
//! owning_key (32 bytes)
//!     -> BLAKE3(owning_key) -> 32 bytes
//!     -> Bech32("goody", hash) -> goody1qw508d6qe...
//! ```
//!
//! Bech32 gives the string a checksum, which matters when people paste
//! recipient ids into transfer requests.

use bech32::{Bech32, Hrp};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::PARTY_ID_HRP;
use crate::crypto::{blake3_hash, PublicKey};

/// Errors that can occur while parsing a party id.
#[derive(Debug, Error)]
pub enum PartyIdError {
    #[error("bech32 decode error: {0}")]
    Bech32Decode(String),

    #[error("invalid HRP: expected '{expected}', got '{got}'")]
    InvalidHrp { expected: String, got: String },

    #[error("invalid party id length: expected {expected} bytes, got {got}")]
    InvalidDataLength { expected: usize, got: usize },
}

/// BLAKE3 hash of a party's owning key, displayed as a bech32 address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartyId {
    key_hash: [u8; 32],
}

impl PartyId {
    /// Derives the id of the party owning `key`.
    pub fn from_public_key(key: &PublicKey) -> Self {
        Self {
            key_hash: blake3_hash(key.as_bytes()),
        }
    }

    /// Encodes the id as `goody1...`.
    pub fn to_address(&self) -> String {
        let hrp = Hrp::parse(PARTY_ID_HRP).expect("static HRP is valid");
        bech32::encode::<Bech32>(hrp, &self.key_hash)
            .expect("encoding a 32-byte payload should never fail")
    }

    /// Parses a `goody1...` address, validating HRP, checksum and length.
    pub fn from_address(addr: &str) -> Result<Self, PartyIdError> {
        let (hrp, data) =
            bech32::decode(addr).map_err(|e| PartyIdError::Bech32Decode(e.to_string()))?;

        let expected_hrp = Hrp::parse(PARTY_ID_HRP).expect("static HRP is valid");
        if hrp != expected_hrp {
            return Err(PartyIdError::InvalidHrp {
                expected: PARTY_ID_HRP.to_string(),
                got: hrp.to_string(),
            });
        }

        let key_hash: [u8; 32] =
            data.as_slice()
                .try_into()
                .map_err(|_| PartyIdError::InvalidDataLength {
                    expected: 32,
                    got: data.len(),
                })?;

        Ok(Self { key_hash })
    }

    /// Returns `true` if this id was derived from `key`.
    pub fn matches(&self, key: &PublicKey) -> bool {
        Self::from_public_key(key) == *self
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_address())
    }
}

impl fmt::Debug for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartyId({})", self.to_address())
    }
}

impl std::str::FromStr for PartyId {
    type Err = PartyIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_address(s)
    }
}
