//! Parties, issuer references, and the issuer identity built from both.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use super::party_id::PartyId;
use crate::config::MAX_ISSUER_REF_SIZE;
use crate::crypto::{Keypair, PublicKey};

// ---------------------------------------------------------------------------
// Party
// ---------------------------------------------------------------------------

/// A well-known ledger participant: a display name bound to an owning key.
///
/// Ordering is by owning key first, so sorting parties (and anything keyed
/// by them) is independent of the names people chose.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Party {
    owning_key: PublicKey,
    name: String,
}

impl Party {
    pub fn new(name: impl Into<String>, owning_key: PublicKey) -> Self {
        Self {
            owning_key,
            name: name.into(),
        }
    }

    /// Creates a party with a freshly generated keypair.
    pub fn generate(name: impl Into<String>) -> (Self, Keypair) {
        let keypair = Keypair::generate();
        (Self::new(name, keypair.public_key()), keypair)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owning_key(&self) -> &PublicKey {
        &self.owning_key
    }

    pub fn id(&self) -> PartyId {
        PartyId::from_public_key(&self.owning_key)
    }

    /// Qualifies this party with an issuer reference, e.g.
    /// `bank.reference(OpaqueBytes::new(b"vault-7")?)`.
    pub fn reference(&self, reference: OpaqueBytes) -> PartyAndReference {
        PartyAndReference {
            party: self.clone(),
            reference,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Debug for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Party({}, {})", self.name, &self.owning_key.to_hex()[..8])
    }
}

// ---------------------------------------------------------------------------
// OpaqueBytes
// ---------------------------------------------------------------------------

/// The issuer reference was larger than the protocol allows.
#[derive(Debug, Error)]
#[error("issuer reference is {size} bytes, maximum is {max}")]
pub struct ReferenceTooLarge {
    pub size: usize,
    pub max: usize,
}

/// Opaque issuer reference bytes. Serialised as lower-case hex.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpaqueBytes(Vec<u8>);

impl OpaqueBytes {
    /// Wraps `bytes`, refusing anything over [`MAX_ISSUER_REF_SIZE`].
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ReferenceTooLarge> {
        let bytes = bytes.into();
        if bytes.len() > MAX_ISSUER_REF_SIZE {
            return Err(ReferenceTooLarge {
                size: bytes.len(),
                max: MAX_ISSUER_REF_SIZE,
            });
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for OpaqueBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex().to_uppercase())
    }
}

impl fmt::Debug for OpaqueBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueBytes({})", self)
    }
}

impl std::str::FromStr for OpaqueBytes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| e.to_string())?;
        Self::new(bytes).map_err(|e| e.to_string())
    }
}

impl Serialize for OpaqueBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for OpaqueBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// PartyAndReference
// ---------------------------------------------------------------------------

/// An issuer: the party that minted a batch and the reference it minted
/// it under. Two issuers are equal only if both halves match.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartyAndReference {
    pub party: Party,
    pub reference: OpaqueBytes,
}

impl fmt::Display for PartyAndReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.party, self.reference)
    }
}

impl fmt::Debug for PartyAndReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{}", self.party, self.reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_size_is_bounded() {
        assert!(OpaqueBytes::new(vec![0u8; MAX_ISSUER_REF_SIZE]).is_ok());
        let err = OpaqueBytes::new(vec![0u8; MAX_ISSUER_REF_SIZE + 1]).unwrap_err();
        assert_eq!(err.size, MAX_ISSUER_REF_SIZE + 1);
    }

    #[test]
    fn reference_serialises_as_hex() {
        let r = OpaqueBytes::new(vec![0x65, 0x33, 0x00, 0x24, 0x7C, 0x69]).unwrap();
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"653300247c69\"");
        let back: OpaqueBytes = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn issuers_differ_by_reference() {
        let (bank, _) = Party::generate("Bank of Goodies");
        let a = bank.reference(OpaqueBytes::new(vec![1]).unwrap());
        let b = bank.reference(OpaqueBytes::new(vec![2]).unwrap());
        assert_ne!(a, b);
        assert_eq!(a, bank.reference(OpaqueBytes::new(vec![1]).unwrap()));
    }

    #[test]
    fn issuers_differ_by_party() {
        let (bank, _) = Party::generate("Bank of Goodies");
        let (shop, _) = Party::generate("Shop of Goodies");
        let r = OpaqueBytes::new(vec![1]).unwrap();
        assert_ne!(bank.reference(r.clone()), shop.reference(r));
    }

    #[test]
    fn party_id_matches_owning_key() {
        let (alice, kp) = Party::generate("Alice");
        assert!(alice.id().matches(&kp.public_key()));
        assert_eq!(alice.to_string(), "Alice");
    }
}
