//! Ledger states and the references that locate them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::asset::{Amount, IssuedToken};
use crate::crypto::PublicKey;
use crate::identity::{Party, PartyAndReference};
use crate::transaction::TxId;

// ---------------------------------------------------------------------------
// GoodyState
// ---------------------------------------------------------------------------

/// One discrete unit of goodies on the ledger: an issuer-qualified amount
/// and the party that currently owns it.
///
/// States are immutable. A transition consumes whole states and produces
/// new ones; ownership changes and partial spends are expressed by the
/// `with_*` constructors, never by mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoodyState {
    pub amount: Amount<IssuedToken>,
    pub owner: Party,
}

impl GoodyState {
    pub fn new(amount: Amount<IssuedToken>, owner: Party) -> Self {
        Self { amount, owner }
    }

    pub fn issuer(&self) -> &PartyAndReference {
        &self.amount.token.issuer
    }

    /// `true` if `party` minted this state, under any reference.
    pub fn is_issued_by(&self, party: &Party) -> bool {
        &self.amount.token.issuer.party == party
    }

    pub fn with_new_owner(&self, owner: Party) -> Self {
        Self {
            amount: self.amount.clone(),
            owner,
        }
    }

    pub fn with_new_owner_and_amount(&self, owner: Party, amount: Amount<IssuedToken>) -> Self {
        Self { amount, owner }
    }

    /// Keys that must sign to exit this state: its owner and its issuer.
    pub fn exit_keys(&self) -> BTreeSet<PublicKey> {
        let mut keys = BTreeSet::new();
        keys.insert(*self.owner.owning_key());
        keys.insert(*self.amount.token.issuer.party.owning_key());
        keys
    }

    pub fn participants(&self) -> Vec<Party> {
        vec![self.owner.clone()]
    }

    /// Appends the canonical encoding used for transaction ids.
    pub(crate) fn write_canonical(&self, buf: &mut Vec<u8>) {
        write_amount(buf, &self.amount);
        write_party(buf, &self.owner);
    }
}

impl fmt::Display for GoodyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} owned by {}", self.amount, self.owner)
    }
}

// ---------------------------------------------------------------------------
// StateRef / StateAndRef
// ---------------------------------------------------------------------------

/// Locates a state: the transaction that produced it and its output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateRef {
    pub tx_id: TxId,
    pub index: u32,
}

impl StateRef {
    pub fn new(tx_id: TxId, index: u32) -> Self {
        Self { tx_id, index }
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.tx_id, self.index)
    }
}

/// An unspent state together with where it lives and who notarises it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndRef {
    pub state: GoodyState,
    pub notary: Party,
    pub state_ref: StateRef,
}

// ---------------------------------------------------------------------------
// Canonical encoding helpers
// ---------------------------------------------------------------------------

pub(crate) fn write_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

pub(crate) fn write_party(buf: &mut Vec<u8>, party: &Party) {
    buf.extend_from_slice(party.owning_key().as_bytes());
    write_len_prefixed(buf, party.name().as_bytes());
}

pub(crate) fn write_amount(buf: &mut Vec<u8>, amount: &Amount<IssuedToken>) {
    buf.extend_from_slice(&amount.quantity.to_le_bytes());
    write_len_prefixed(buf, amount.token.product.name().as_bytes());
    write_party(buf, &amount.token.issuer.party);
    write_len_prefixed(buf, amount.token.issuer.reference.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Token;
    use crate::identity::OpaqueBytes;

    fn nougat_from(issuer: &Party, q: u64) -> Amount<IssuedToken> {
        Amount::new(q, Token::new("Nougat")).issued_by(issuer.reference(OpaqueBytes::new(vec![1]).unwrap()))
    }

    #[test]
    fn new_owner_keeps_amount() {
        let (bank, _) = Party::generate("Bank");
        let (alice, _) = Party::generate("Alice");
        let state = GoodyState::new(nougat_from(&bank, 100), bank.clone());

        let moved = state.with_new_owner(alice.clone());
        assert_eq!(moved.amount, state.amount);
        assert_eq!(moved.owner, alice);
        assert!(moved.is_issued_by(&bank));
        assert!(!moved.is_issued_by(&alice));
    }

    #[test]
    fn exit_keys_cover_owner_and_issuer() {
        let (bank, _) = Party::generate("Bank");
        let (alice, _) = Party::generate("Alice");
        let state = GoodyState::new(nougat_from(&bank, 5), alice.clone());

        let keys = state.exit_keys();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(alice.owning_key()));
        assert!(keys.contains(bank.owning_key()));

        let own = GoodyState::new(nougat_from(&bank, 5), bank.clone());
        assert_eq!(own.exit_keys().len(), 1);
    }

    #[test]
    fn canonical_encoding_depends_on_owner() {
        let (bank, _) = Party::generate("Bank");
        let (alice, _) = Party::generate("Alice");
        let a = GoodyState::new(nougat_from(&bank, 5), bank.clone());
        let b = a.with_new_owner(alice);

        let (mut ba, mut bb) = (Vec::new(), Vec::new());
        a.write_canonical(&mut ba);
        b.write_canonical(&mut bb);
        assert_ne!(ba, bb);
    }
}
