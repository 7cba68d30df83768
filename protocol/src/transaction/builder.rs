//! Transaction construction via the builder pattern.
//!
//! The [`TransactionBuilder`] collects a notary, a command, inputs and
//! outputs, and `.build()` returns an unsigned [`Transaction`] whose id is
//! derived from its contents. The builder does not verify and does not
//! sign; the orchestrator runs the verifier and collects signatures as
//! separate steps.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::types::TxId;
use crate::config::TRANSACTION_VERSION;
use crate::contract::state::{write_len_prefixed, write_party};
use crate::contract::{self, Command, GoodyState, Rejection, StateAndRef, StateRef};
use crate::crypto::hash::double_sha256;
use crate::crypto::PublicKey;
use crate::identity::Party;
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A proposed state transition: consume `inputs`, produce `outputs`,
/// under `command`, guarded by `notary`.
///
/// # Canonical Byte Format
///
/// [`Transaction::signable_bytes`] serialises, in order: version, notary,
/// input refs, outputs, command, timestamp, nonce. Integers are fixed-width
/// little-endian; strings and byte blobs are `u32` length-prefixed. The
/// input *states* are not encoded, only their refs, since a ref pins its
/// state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// `double_sha256(signable_bytes)`.
    pub id: TxId,

    pub version: u16,

    /// The notary every input is guarded by, and that will guard every output.
    pub notary: Party,

    pub inputs: Vec<StateAndRef>,

    pub outputs: Vec<GoodyState>,

    pub command: Command,

    /// Unix milliseconds at build time.
    pub timestamp: u64,

    /// Random by default. Keeps ids of otherwise identical issues distinct.
    pub nonce: u64,
}

impl Transaction {
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128 + 160 * self.outputs.len());

        buf.extend_from_slice(&self.version.to_le_bytes());
        write_party(&mut buf, &self.notary);

        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            buf.extend_from_slice(input.state_ref.tx_id.as_bytes());
            buf.extend_from_slice(&input.state_ref.index.to_le_bytes());
        }

        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            output.write_canonical(&mut buf);
        }

        self.command.write_canonical(&mut buf);
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());

        // Trailing tag so the encoding can be extended without ambiguity.
        write_len_prefixed(&mut buf, b"goody");
        buf
    }

    pub fn compute_id(&self) -> TxId {
        TxId::from_bytes(double_sha256(&self.signable_bytes()))
    }

    pub fn input_refs(&self) -> Vec<StateRef> {
        self.inputs.iter().map(|i| i.state_ref).collect()
    }

    pub fn consumed_states(&self) -> Vec<GoodyState> {
        self.inputs.iter().map(|i| i.state.clone()).collect()
    }

    /// Refs the outputs will have once this transaction is recorded.
    pub fn output_refs(&self) -> Vec<StateRef> {
        (0..self.outputs.len() as u32)
            .map(|index| StateRef::new(self.id, index))
            .collect()
    }

    /// The outputs paired with their future refs and this transaction's notary.
    pub fn output_states(&self) -> Vec<StateAndRef> {
        self.outputs
            .iter()
            .zip(self.output_refs())
            .map(|(state, state_ref)| StateAndRef {
                state: state.clone(),
                notary: self.notary.clone(),
                state_ref,
            })
            .collect()
    }

    /// Keys that must sign before this transaction can be finalised.
    pub fn required_signers(&self) -> BTreeSet<PublicKey> {
        contract::required_signers(&self.consumed_states(), &self.command)
    }

    /// Runs the conservation verifier as if `signers` had signed.
    pub fn verify(&self, signers: &BTreeSet<PublicKey>) -> Result<(), Rejection> {
        contract::verify(&self.consumed_states(), &self.outputs, &self.command, signers)
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for unsigned [`Transaction`]s.
///
/// ```rust,ignore
/// let tx = TransactionBuilder::new(notary, Command::Move)
///     .inputs(selected)
///     .output(payment)
///     .output(change)
///     .build();
/// ```
pub struct TransactionBuilder {
    version: u16,
    notary: Party,
    command: Command,
    inputs: Vec<StateAndRef>,
    outputs: Vec<GoodyState>,
    timestamp: Option<u64>,
    nonce: Option<u64>,
}

impl TransactionBuilder {
    pub fn new(notary: Party, command: Command) -> Self {
        Self {
            version: TRANSACTION_VERSION,
            notary,
            command,
            inputs: Vec::new(),
            outputs: Vec::new(),
            timestamp: None,
            nonce: None,
        }
    }

    /// Only needed for testing version upgrades.
    pub fn version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    pub fn input(mut self, input: StateAndRef) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn inputs(mut self, inputs: impl IntoIterator<Item = StateAndRef>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn output(mut self, output: GoodyState) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn outputs(mut self, outputs: impl IntoIterator<Item = GoodyState>) -> Self {
        self.outputs.extend(outputs);
        self
    }

    /// Sets the timestamp explicitly (Unix milliseconds). Defaults to now.
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Fixes the nonce. Only tests that compare ids need this.
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn build(self) -> Transaction {
        let timestamp = self
            .timestamp
            .unwrap_or_else(|| Utc::now().timestamp_millis() as u64);

        let mut tx = Transaction {
            id: TxId::from_bytes([0u8; 32]),
            version: self.version,
            notary: self.notary,
            inputs: self.inputs,
            outputs: self.outputs,
            command: self.command,
            timestamp,
            nonce: self.nonce.unwrap_or_else(rand::random),
        };

        tx.id = tx.compute_id();
        tx
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Amount, IssuedToken, Token};
    use crate::identity::OpaqueBytes;

    fn nougat(issuer: &Party, q: u64) -> Amount<IssuedToken> {
        Amount::new(q, Token::new("Nougat")).issued_by(issuer.reference(OpaqueBytes::new(vec![1]).unwrap()))
    }

    fn sample_issue(notary: &Party, bank: &Party, ts: u64) -> Transaction {
        TransactionBuilder::new(notary.clone(), Command::Issue { amount: nougat(bank, 100) })
            .output(GoodyState::new(nougat(bank, 100), bank.clone()))
            .timestamp(ts)
            .nonce(7)
            .build()
    }

    #[test]
    fn builder_produces_deterministic_id() {
        let (notary, _) = Party::generate("Notary");
        let (bank, _) = Party::generate("Bank");
        let a = sample_issue(&notary, &bank, 1_700_000_000_000);
        let b = sample_issue(&notary, &bank, 1_700_000_000_000);
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, a.compute_id());
    }

    #[test]
    fn timestamp_changes_id() {
        let (notary, _) = Party::generate("Notary");
        let (bank, _) = Party::generate("Bank");
        let a = sample_issue(&notary, &bank, 1);
        let b = sample_issue(&notary, &bank, 2);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn version_included_in_id() {
        let (notary, _) = Party::generate("Notary");
        let (bank, _) = Party::generate("Bank");
        let v1 = sample_issue(&notary, &bank, 1);
        let v2 = TransactionBuilder::new(notary.clone(), Command::Issue { amount: nougat(&bank, 100) })
            .version(2)
            .output(GoodyState::new(nougat(&bank, 100), bank.clone()))
            .timestamp(1)
            .nonce(7)
            .build();
        assert_eq!(v1.version, TRANSACTION_VERSION);
        assert_ne!(v1.id, v2.id);
    }

    #[test]
    fn output_refs_point_back_at_the_transaction() {
        let (notary, _) = Party::generate("Notary");
        let (bank, _) = Party::generate("Bank");
        let tx = sample_issue(&notary, &bank, 1);
        let outs = tx.output_states();
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].state_ref, StateRef::new(tx.id, 0));
        assert_eq!(outs[0].notary, notary);
    }

    #[test]
    fn issue_requires_the_issuer_only() {
        let (notary, _) = Party::generate("Notary");
        let (bank, _) = Party::generate("Bank");
        let tx = sample_issue(&notary, &bank, 1);
        let required = tx.required_signers();
        assert_eq!(required.len(), 1);
        assert!(required.contains(bank.owning_key()));
        assert!(tx.verify(&required).is_ok());
    }

    #[test]
    fn identical_issues_get_distinct_ids() {
        let (notary, _) = Party::generate("Notary");
        let (bank, _) = Party::generate("Bank");
        let build = || {
            TransactionBuilder::new(notary.clone(), Command::Issue { amount: nougat(&bank, 100) })
                .output(GoodyState::new(nougat(&bank, 100), bank.clone()))
                .timestamp(1)
                .build()
        };
        assert_ne!(build().id, build().id);
    }

    #[test]
    fn builder_uses_current_time_if_not_set() {
        let (notary, _) = Party::generate("Notary");
        let (bank, _) = Party::generate("Bank");
        let before = Utc::now().timestamp_millis() as u64;
        let tx = TransactionBuilder::new(notary, Command::Issue { amount: nougat(&bank, 1) })
            .output(GoodyState::new(nougat(&bank, 1), bank.clone()))
            .build();
        let after = Utc::now().timestamp_millis() as u64;
        assert!(tx.timestamp >= before && tx.timestamp <= after);
    }

    #[test]
    fn transaction_json_roundtrip() {
        let (notary, _) = Party::generate("Notary");
        let (bank, _) = Party::generate("Bank");
        let tx = sample_issue(&notary, &bank, 1);
        let json = serde_json::to_string(&tx).unwrap();
        let recovered: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, recovered);
        assert_eq!(recovered.compute_id(), tx.id);
    }
}
